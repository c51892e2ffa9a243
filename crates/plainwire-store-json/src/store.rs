//! [`JsonLedger`], the JSON-file implementation of [`StoryLedger`].

use std::{collections::BTreeMap, path::Path, sync::Arc};

use chrono::{DateTime, NaiveDate, Utc};
use plainwire_core::{
  correction::{CorrectionFilter, CorrectionKind, CorrectionRecord},
  ledger::{PublishError, StoryFilter, StoryLedger},
  oracle::Extraction,
  story::{CorroboratedSources, Story, StoryId, StoryProposal, StoryStatus, normalize_story_id},
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
  Error, Result,
  document::{
    LedgerPaths, load_corrections, load_processed, load_stories, write_corrections,
    write_processed, write_stories,
  },
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A story ledger backed by two JSON files in one directory.
///
/// Cloning is cheap; clones share the same state. All mutation is serialized
/// through a single lock, matching the single-writer cycle model.
#[derive(Clone)]
pub struct JsonLedger {
  state: Arc<Mutex<State>>,
  /// `None` for an in-memory ledger.
  paths: Option<Arc<LedgerPaths>>,
}

#[derive(Default)]
struct State {
  stories:     Vec<Story>,
  corrections: Vec<CorrectionRecord>,
  /// Extraction answers per day, loaded on first use.
  processed:   BTreeMap<NaiveDate, BTreeMap<String, Extraction>>,
}

impl State {
  fn position(&self, id: &StoryId) -> Option<usize> {
    // Newest stories are the likeliest targets.
    self.stories.iter().rposition(|s| &s.id == id)
  }

  fn next_id(&self, date: chrono::NaiveDate) -> StoryId {
    let last = self
      .stories
      .iter()
      .filter(|s| s.id.date == date)
      .map(|s| s.id.seq)
      .max()
      .unwrap_or(0);
    StoryId::new(date, last + 1)
  }
}

impl JsonLedger {
  /// Open (or create) a ledger in `dir`, loading any existing files.
  pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir)
      .await
      .map_err(|source| Error::Io { path: dir.to_owned(), source })?;

    let paths = LedgerPaths::in_dir(dir);
    let stories = load_stories(&paths.stories).await?;
    let corrections = load_corrections(&paths.corrections).await?;
    tracing::debug!(
      stories = stories.len(),
      corrections = corrections.len(),
      dir = %dir.display(),
      "opened ledger"
    );

    Ok(Self {
      state: Arc::new(Mutex::new(State { stories, corrections, processed: BTreeMap::new() })),
      paths: Some(Arc::new(paths)),
    })
  }

  /// A ledger that never touches disk. Used by tests.
  pub fn in_memory() -> Self {
    Self { state: Arc::new(Mutex::new(State::default())), paths: None }
  }

  async fn persist_stories(&self, state: &State) -> Result<()> {
    match &self.paths {
      Some(paths) => write_stories(&paths.stories, &state.stories).await,
      None => Ok(()),
    }
  }

  async fn persist_corrections(&self, state: &State) -> Result<()> {
    match &self.paths {
      Some(paths) => write_corrections(&paths.corrections, &state.corrections).await,
      None => Ok(()),
    }
  }

  /// Make sure `day`'s extraction cache is in memory. Earlier days are
  /// dropped; cycles only ever ask about the current one.
  async fn load_day<'s>(
    &self,
    state: &'s mut State,
    day: NaiveDate,
  ) -> Result<&'s mut BTreeMap<String, Extraction>> {
    if !state.processed.contains_key(&day) {
      let loaded = match &self.paths {
        Some(paths) => load_processed(&paths.processed(day)).await?,
        None => BTreeMap::new(),
      };
      state.processed.retain(|d, _| *d > day);
      state.processed.insert(day, loaded);
    }
    Ok(state.processed.entry(day).or_default())
  }

  /// Shared body of `apply_correction` / `apply_retraction`.
  async fn transition(&self, record: &CorrectionRecord, kind: CorrectionKind) -> Result<bool> {
    let target = normalize_story_id(&record.target_story_id);
    let Ok(id) = target.parse::<StoryId>() else {
      tracing::debug!(%target, "correction target is not a story id");
      return Ok(false);
    };

    let mut state = self.state.lock().await;
    let Some(idx) = state.position(&id) else {
      return Ok(false);
    };

    let current = &state.stories[idx].status;
    if kind.is_reflected_in(current) {
      return Ok(true);
    }
    if !kind.can_apply_to(current) {
      tracing::debug!(%id, status = current.name(), %kind, "story already resolved");
      return Ok(false);
    }

    let resolved_at = record.detected_at;
    let next = match kind {
      CorrectionKind::Correction => StoryStatus::Corrected {
        correction_note: record.reason.clone(),
        resolved_at,
      },
      CorrectionKind::Retraction => StoryStatus::Retracted {
        retraction_note: record.reason.clone(),
        resolved_at,
      },
    };

    let previous = std::mem::replace(&mut state.stories[idx].status, next);
    if let Err(e) = self.persist_stories(&state).await {
      state.stories[idx].status = previous;
      return Err(e);
    }
    Ok(true)
  }
}

// ─── StoryLedger impl ────────────────────────────────────────────────────────

impl StoryLedger for JsonLedger {
  type Error = Error;

  // ── Stories ───────────────────────────────────────────────────────────────

  async fn publish(&self, proposal: StoryProposal) -> Result<Story, PublishError<Error>> {
    proposal.validate()?;
    let sources = CorroboratedSources::try_from(proposal.sources)?;

    let mut state = self.state.lock().await;
    let story = Story {
      id: state.next_id(proposal.proposed_at.date_naive()),
      fact_text: proposal.fact_text,
      sources,
      location_tag: proposal.location_tag,
      status: StoryStatus::Published,
      published_at: proposal.proposed_at,
      claim_key: proposal.claim_key,
    };

    state.stories.push(story.clone());
    if let Err(e) = self.persist_stories(&state).await {
      state.stories.pop();
      return Err(PublishError::Store(e));
    }
    Ok(story)
  }

  async fn apply_correction(&self, record: &CorrectionRecord) -> Result<bool> {
    self.transition(record, CorrectionKind::Correction).await
  }

  async fn apply_retraction(&self, record: &CorrectionRecord) -> Result<bool> {
    self.transition(record, CorrectionKind::Retraction).await
  }

  async fn get(&self, id: &str) -> Result<Option<Story>> {
    let Ok(id) = normalize_story_id(id).parse::<StoryId>() else {
      return Ok(None);
    };
    let state = self.state.lock().await;
    Ok(state.position(&id).map(|idx| state.stories[idx].clone()))
  }

  async fn list(&self, filter: &StoryFilter) -> Result<Vec<Story>> {
    let state = self.state.lock().await;
    let matching = state.stories.iter().filter(|s| filter.matches(s)).cloned();
    Ok(match filter.limit {
      Some(limit) => matching.take(limit).collect(),
      None => matching.collect(),
    })
  }

  // ── Correction log ────────────────────────────────────────────────────────

  async fn record_correction(&self, mut record: CorrectionRecord) -> Result<CorrectionRecord> {
    record.target_story_id = normalize_story_id(&record.target_story_id);

    let mut state = self.state.lock().await;
    if let Some(existing) = state
      .corrections
      .iter()
      .find(|r| r.record_id == record.record_id)
    {
      return Ok(existing.clone());
    }

    state.corrections.push(record.clone());
    if let Err(e) = self.persist_corrections(&state).await {
      state.corrections.pop();
      return Err(e);
    }
    Ok(record)
  }

  async fn mark_applied(&self, record_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
    let mut state = self.state.lock().await;
    let Some(idx) = state
      .corrections
      .iter()
      .position(|r| r.record_id == record_id)
    else {
      return Ok(false);
    };
    if state.corrections[idx].applied {
      return Ok(true);
    }

    state.corrections[idx].applied = true;
    state.corrections[idx].applied_at = Some(at);
    if let Err(e) = self.persist_corrections(&state).await {
      state.corrections[idx].applied = false;
      state.corrections[idx].applied_at = None;
      return Err(e);
    }
    Ok(true)
  }

  async fn corrections(&self, filter: &CorrectionFilter) -> Result<Vec<CorrectionRecord>> {
    let state = self.state.lock().await;
    Ok(
      state
        .corrections
        .iter()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect(),
    )
  }

  // ── Headline cache ────────────────────────────────────────────────────────

  async fn processed_headlines(&self, day: NaiveDate) -> Result<BTreeMap<String, Extraction>> {
    let mut state = self.state.lock().await;
    Ok(self.load_day(&mut state, day).await?.clone())
  }

  async fn mark_processed(
    &self,
    day: NaiveDate,
    answers: &BTreeMap<String, Extraction>,
  ) -> Result<()> {
    let mut state = self.state.lock().await;
    let cache = self.load_day(&mut state, day).await?;
    let mut added = Vec::new();
    for (fingerprint, extraction) in answers {
      if !cache.contains_key(fingerprint) {
        cache.insert(fingerprint.clone(), extraction.clone());
        added.push(fingerprint.clone());
      }
    }
    if added.is_empty() {
      return Ok(());
    }

    let Some(paths) = &self.paths else {
      return Ok(());
    };
    if let Err(e) = write_processed(&paths.processed(day), cache).await {
      for fingerprint in &added {
        cache.remove(fingerprint);
      }
      return Err(e);
    }
    tracing::debug!(%day, added = added.len(), "cached extraction answers");
    Ok(())
  }

  async fn flush(&self) -> Result<()> {
    let state = self.state.lock().await;
    self.persist_stories(&state).await?;
    self.persist_corrections(&state).await
  }
}
