//! Scripted collaborators for pipeline tests.

use std::{
  collections::{BTreeMap, HashMap},
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
  },
};

use chrono::{DateTime, NaiveDate, Utc};
use plainwire_core::{
  candidate::Headline,
  correction::{CorrectionFilter, CorrectionRecord},
  ledger::{PublishError, StoryFilter, StoryLedger},
  oracle::{
    ContradictionChecker, ContradictionQuery, ContradictionVerdict, ExtractedFact, Extraction,
    FactExtractor, HeadlineFeed,
  },
  source::Source,
  story::{Story, StoryProposal},
};
use plainwire_store_json::{JsonLedger, error::Error as StoreError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
#[error("fake failure: {0}")]
pub struct FakeError(pub String);

/// Never resolves; the pipeline's timeouts have to cut it off.
async fn hang<T>() -> T { std::future::pending().await }

// ─── Feed ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum FeedReply {
  Headlines(Vec<Headline>),
  Fail,
  Hang,
}

/// Per-source canned replies, swappable between cycles. Sources without a
/// reply return nothing. Clones share replies.
#[derive(Default, Clone)]
pub struct FakeFeed {
  replies: Arc<Mutex<HashMap<String, FeedReply>>>,
}

impl FakeFeed {
  pub fn set(&self, source_name: &str, reply: FeedReply) {
    self.replies.lock().unwrap().insert(source_name.to_owned(), reply);
  }

  pub fn clear(&self) { self.replies.lock().unwrap().clear(); }
}

impl HeadlineFeed for FakeFeed {
  type Error = FakeError;

  async fn fetch(&self, source: &Source) -> Result<Vec<Headline>, FakeError> {
    let reply = self.replies.lock().unwrap().get(&source.name).cloned();
    match reply {
      None => Ok(Vec::new()),
      Some(FeedReply::Headlines(headlines)) => Ok(headlines),
      Some(FeedReply::Fail) => Err(FakeError(format!("{} is down", source.name))),
      Some(FeedReply::Hang) => hang().await,
    }
  }
}

// ─── Extractor ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum ExtractReply {
  Reply(Extraction),
  Fail,
  Hang,
}

/// Replies keyed by headline text. Unknown headlines yield no fact. Every
/// headline asked about is remembered.
#[derive(Default, Clone)]
pub struct FakeExtractor {
  replies: Arc<Mutex<HashMap<String, ExtractReply>>>,
  calls:   Arc<Mutex<Vec<String>>>,
}

impl FakeExtractor {
  /// Texts of the headlines sent for extraction so far, in call order.
  pub fn calls(&self) -> Vec<String> { self.calls.lock().unwrap().clone() }

  pub fn set(&self, headline: &str, reply: ExtractReply) {
    self.replies.lock().unwrap().insert(headline.to_owned(), reply);
  }

  /// Shorthand for a plain fact with no confidence or newsworthiness opinion.
  pub fn fact(&self, headline: &str, claim: &str, cleaned: &str) {
    self.set(headline, ExtractReply::Reply(fact(claim, cleaned)));
  }
}

pub fn fact(claim: &str, cleaned: &str) -> Extraction {
  Extraction::Fact(ExtractedFact {
    extracted_claim: claim.into(),
    cleaned_text:    cleaned.into(),
    location_tag:    None,
    cluster_key:     None,
    confidence:      None,
    newsworthy:      None,
  })
}

impl FactExtractor for FakeExtractor {
  type Error = FakeError;

  async fn extract(&self, headline: &Headline, _source: &Source) -> Result<Extraction, FakeError> {
    self.calls.lock().unwrap().push(headline.text.clone());
    let reply = self.replies.lock().unwrap().get(&headline.text).cloned();
    match reply {
      None => Ok(Extraction::NoFact),
      Some(ExtractReply::Reply(extraction)) => Ok(extraction),
      Some(ExtractReply::Fail) => Err(FakeError("extractor unavailable".into())),
      Some(ExtractReply::Hang) => hang().await,
    }
  }
}

// ─── Checker ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Target {
  /// Hand back the story id exactly as it appeared in the query.
  Echo,
  Fixed(String),
}

#[derive(Debug, Clone)]
pub enum Verdict {
  Correction(String),
  Retraction(String),
  Fail,
}

struct Rule {
  /// Fires when the candidate text contains this.
  when:    String,
  target:  Target,
  verdict: Verdict,
}

/// Rule-driven contradiction oracle that remembers every query it saw.
#[derive(Default, Clone)]
pub struct FakeChecker {
  rules:   Arc<Mutex<Vec<Rule>>>,
  queries: Arc<Mutex<Vec<ContradictionQuery>>>,
}

impl FakeChecker {
  pub fn on(&self, when: &str, target: Target, verdict: Verdict) {
    self.rules.lock().unwrap().push(Rule { when: when.into(), target, verdict });
  }

  pub fn queries(&self) -> Vec<ContradictionQuery> { self.queries.lock().unwrap().clone() }
}

impl ContradictionChecker for FakeChecker {
  type Error = FakeError;

  async fn check(&self, query: &ContradictionQuery) -> Result<ContradictionVerdict, FakeError> {
    self.queries.lock().unwrap().push(query.clone());
    let rules = self.rules.lock().unwrap();
    let Some(rule) = rules.iter().find(|r| query.candidate_text.contains(&r.when)) else {
      return Ok(ContradictionVerdict::NoConflict);
    };
    let target_id = match &rule.target {
      Target::Echo => query.story_id.clone(),
      Target::Fixed(id) => id.clone(),
    };
    match &rule.verdict {
      Verdict::Correction(reason) => {
        Ok(ContradictionVerdict::Correction { target_id, reason: reason.clone() })
      }
      Verdict::Retraction(reason) => {
        Ok(ContradictionVerdict::Retraction { target_id, reason: reason.clone() })
      }
      Verdict::Fail => Err(FakeError("checker unavailable".into())),
    }
  }
}

// ─── Ledger spy ──────────────────────────────────────────────────────────────

/// An in-memory [`JsonLedger`] that records every story id the pipeline
/// hands it, and can be told to misbehave.
pub struct SpyLedger {
  inner:              JsonLedger,
  seen_ids:           Mutex<Vec<String>>,
  /// Report transitions as done without performing them.
  pub lie:            AtomicBool,
  pub fail_publish:   AtomicBool,
  /// Answer `mark_applied` as if the record did not exist.
  pub forget_records: AtomicBool,
}

impl SpyLedger {
  pub fn new() -> Self {
    Self {
      inner:          JsonLedger::in_memory(),
      seen_ids:       Mutex::default(),
      lie:            AtomicBool::new(false),
      fail_publish:   AtomicBool::new(false),
      forget_records: AtomicBool::new(false),
    }
  }

  pub fn seen_ids(&self) -> Vec<String> { self.seen_ids.lock().unwrap().clone() }

  fn saw(&self, id: &str) { self.seen_ids.lock().unwrap().push(id.to_owned()); }
}

impl StoryLedger for SpyLedger {
  type Error = StoreError;

  async fn publish(&self, proposal: StoryProposal) -> Result<Story, PublishError<StoreError>> {
    if self.fail_publish.load(Ordering::SeqCst) {
      return Err(PublishError::Store(StoreError::Corrupt("disk full".into())));
    }
    self.inner.publish(proposal).await
  }

  async fn apply_correction(&self, record: &CorrectionRecord) -> Result<bool, StoreError> {
    self.saw(&record.target_story_id);
    if self.lie.load(Ordering::SeqCst) {
      return Ok(true);
    }
    self.inner.apply_correction(record).await
  }

  async fn apply_retraction(&self, record: &CorrectionRecord) -> Result<bool, StoreError> {
    self.saw(&record.target_story_id);
    if self.lie.load(Ordering::SeqCst) {
      return Ok(true);
    }
    self.inner.apply_retraction(record).await
  }

  async fn get(&self, id: &str) -> Result<Option<Story>, StoreError> {
    self.saw(id);
    self.inner.get(id).await
  }

  async fn list(&self, filter: &StoryFilter) -> Result<Vec<Story>, StoreError> {
    self.inner.list(filter).await
  }

  async fn record_correction(&self, record: CorrectionRecord) -> Result<CorrectionRecord, StoreError> {
    self.inner.record_correction(record).await
  }

  async fn mark_applied(&self, record_id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
    if self.forget_records.load(Ordering::SeqCst) {
      return Ok(false);
    }
    self.inner.mark_applied(record_id, at).await
  }

  async fn corrections(&self, filter: &CorrectionFilter) -> Result<Vec<CorrectionRecord>, StoreError> {
    self.inner.corrections(filter).await
  }

  async fn processed_headlines(
    &self,
    day: NaiveDate,
  ) -> Result<BTreeMap<String, Extraction>, StoreError> {
    self.inner.processed_headlines(day).await
  }

  async fn mark_processed(
    &self,
    day: NaiveDate,
    answers: &BTreeMap<String, Extraction>,
  ) -> Result<(), StoreError> {
    self.inner.mark_processed(day, answers).await
  }

  async fn flush(&self) -> Result<(), StoreError> { self.inner.flush().await }
}
