//! The `StoryLedger` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `plainwire-store-json`).
//! The pipeline and the read API depend on this abstraction, not on any
//! concrete backend.

use std::{collections::BTreeMap, future::Future};

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::{
  ValidationError,
  correction::{CorrectionFilter, CorrectionRecord},
  oracle::Extraction,
  story::{StatusKind, Story, StoryProposal},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`StoryLedger::list`]. Results come back in ledger order.
#[derive(Debug, Clone, Default)]
pub struct StoryFilter {
  pub status:           Option<StatusKind>,
  pub published_after:  Option<DateTime<Utc>>,
  pub published_before: Option<DateTime<Utc>>,
  pub location_tag:     Option<String>,
  pub claim_key:        Option<String>,
  pub limit:            Option<usize>,
}

impl StoryFilter {
  pub fn matches(&self, story: &Story) -> bool {
    if self.status.is_some_and(|s| !s.matches(&story.status)) {
      return false;
    }
    if self.published_after.is_some_and(|t| story.published_at < t) {
      return false;
    }
    if self.published_before.is_some_and(|t| story.published_at >= t) {
      return false;
    }
    if let Some(tag) = &self.location_tag
      && story.location_tag.as_deref() != Some(tag.as_str())
    {
      return false;
    }
    if let Some(key) = &self.claim_key
      && &story.claim_key != key
    {
      return false;
    }
    true
  }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Failure of [`StoryLedger::publish`]: either the proposal was invalid
/// (expected, recoverable) or the backend failed (fatal for the cycle).
#[derive(Debug, Error)]
pub enum PublishError<E> {
  #[error("proposal rejected: {0}")]
  Validation(#[from] ValidationError),

  #[error("ledger error: {0}")]
  Store(#[source] E),
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a story ledger backend.
///
/// The ledger exclusively owns stories and correction records. Stories are
/// never deleted or renumbered, and a story's `fact_text` is never rewritten.
/// Every method that takes an externally supplied story id normalizes it
/// with [`crate::story::normalize_story_id`] before use.
///
/// All methods return `Send` futures so the trait can be used from a
/// multi-threaded tokio runtime.
pub trait StoryLedger: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Stories ───────────────────────────────────────────────────────────

  /// Validate `proposal`, assign the next sequence number for its date, and
  /// persist it as a published story.
  fn publish(
    &self,
    proposal: StoryProposal,
  ) -> impl Future<Output = Result<Story, PublishError<Self::Error>>> + Send + '_;

  /// Move the record's target story to `corrected`, stamping
  /// `resolved_at` with the record's `detected_at`.
  ///
  /// Returns `Ok(false)` if the target does not resolve to a story or the
  /// story is already retracted. Re-applying to an already corrected story
  /// returns `Ok(true)` and changes nothing.
  fn apply_correction<'a>(
    &'a self,
    record: &'a CorrectionRecord,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Move the record's target story to `retracted`. A corrected story may
  /// still be retracted; a retracted one never changes again. Same return
  /// contract as [`StoryLedger::apply_correction`].
  fn apply_retraction<'a>(
    &'a self,
    record: &'a CorrectionRecord,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Look up a story. `id` may carry delimiters.
  fn get<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<Story>, Self::Error>> + Send + 'a;

  fn list<'a>(
    &'a self,
    filter: &'a StoryFilter,
  ) -> impl Future<Output = Result<Vec<Story>, Self::Error>> + Send + 'a;

  // ── Correction log ────────────────────────────────────────────────────

  /// Append a record to the correction log.
  fn record_correction(
    &self,
    record: CorrectionRecord,
  ) -> impl Future<Output = Result<CorrectionRecord, Self::Error>> + Send + '_;

  /// Flip a record's `applied` flag. Returns `Ok(false)` if no such record
  /// exists. Already-applied records are left untouched.
  fn mark_applied(
    &self,
    record_id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn corrections<'a>(
    &'a self,
    filter: &'a CorrectionFilter,
  ) -> impl Future<Output = Result<Vec<CorrectionRecord>, Self::Error>> + Send + 'a;

  // ── Headline cache ────────────────────────────────────────────────────

  /// The extraction oracle's answers for headlines already processed on
  /// `day`, keyed by [`crate::candidate::Headline::fingerprint`].
  fn processed_headlines(
    &self,
    day: NaiveDate,
  ) -> impl Future<Output = Result<BTreeMap<String, Extraction>, Self::Error>> + Send + '_;

  /// Add `answers` to `day`'s cache. Fingerprints already present keep
  /// their first answer.
  fn mark_processed<'a>(
    &'a self,
    day: NaiveDate,
    answers: &'a BTreeMap<String, Extraction>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Make sure everything accepted so far is durably written.
  fn flush(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
