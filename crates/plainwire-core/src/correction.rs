//! Correction and retraction records: the audit trail of detections.
//!
//! A record is written as soon as a contradiction is detected, before the
//! ledger is touched, and is never deleted. Its only mutable field is
//! `applied`, which flips to `true` once the target story's status has been
//! confirmed changed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::story::{StoryStatus, normalize_story_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionKind {
  Correction,
  Retraction,
}

impl CorrectionKind {
  /// Whether `status` is the state this kind of record moves a story into.
  pub fn is_reflected_in(self, status: &StoryStatus) -> bool {
    matches!(
      (self, status),
      (Self::Correction, StoryStatus::Corrected { .. })
        | (Self::Retraction, StoryStatus::Retracted { .. })
    )
  }

  /// Whether a story in `status` may still move to this kind's state.
  /// A correction settles the wording question for good, but a corrected
  /// story can still be retracted. Retraction is final.
  pub fn can_apply_to(self, status: &StoryStatus) -> bool {
    matches!(
      (self, status),
      (_, StoryStatus::Published) | (Self::Retraction, StoryStatus::Corrected { .. })
    )
  }
}

impl fmt::Display for CorrectionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Correction => "correction",
      Self::Retraction => "retraction",
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionRecord {
  pub record_id:       Uuid,
  /// Always in normalized form; see [`normalize_story_id`].
  pub target_story_id: String,
  pub kind:            CorrectionKind,
  pub reason:          String,
  pub detected_at:     DateTime<Utc>,
  pub applied:         bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub applied_at:      Option<DateTime<Utc>>,
}

impl CorrectionRecord {
  /// Create an unapplied record. `target` may still carry the oracle's
  /// delimiters; it is normalized here before anything is persisted.
  pub fn new(
    target: &str,
    kind: CorrectionKind,
    reason: impl Into<String>,
    detected_at: DateTime<Utc>,
  ) -> Self {
    Self {
      record_id: Uuid::new_v4(),
      target_story_id: normalize_story_id(target),
      kind,
      reason: reason.into(),
      detected_at,
      applied: false,
      applied_at: None,
    }
  }
}

/// Parameters for [`crate::ledger::StoryLedger::corrections`].
#[derive(Debug, Clone, Default)]
pub struct CorrectionFilter {
  pub target_story_id: Option<String>,
  pub kind:            Option<CorrectionKind>,
  /// `Some(false)` returns only records still awaiting application.
  pub applied:         Option<bool>,
  /// Inclusive lower bound on `detected_at`.
  pub detected_after:  Option<DateTime<Utc>>,
  /// Exclusive upper bound on `detected_at`.
  pub detected_before: Option<DateTime<Utc>>,
}

impl CorrectionFilter {
  pub fn pending() -> Self {
    Self { applied: Some(false), ..Self::default() }
  }

  pub fn matches(&self, record: &CorrectionRecord) -> bool {
    if let Some(target) = &self.target_story_id
      && normalize_story_id(target) != record.target_story_id
    {
      return false;
    }
    if self.kind.is_some_and(|k| k != record.kind) {
      return false;
    }
    if self.applied.is_some_and(|a| a != record.applied) {
      return false;
    }
    if self.detected_after.is_some_and(|t| record.detected_at < t) {
      return false;
    }
    if self.detected_before.is_some_and(|t| record.detected_at >= t) {
      return false;
    }
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_record_stores_normalized_target() {
    let record = CorrectionRecord::new(
      "[2026-03-01-001]",
      CorrectionKind::Correction,
      "death toll revised",
      Utc::now(),
    );
    assert_eq!(record.target_story_id, "2026-03-01-001");
    assert!(!record.applied);
    assert!(record.applied_at.is_none());
  }

  #[test]
  fn filter_matches_wrapped_target() {
    let record = CorrectionRecord::new(
      "2026-03-01-001",
      CorrectionKind::Retraction,
      "hoax",
      Utc::now(),
    );
    let filter = CorrectionFilter {
      target_story_id: Some("[2026-03-01-001]".into()),
      ..CorrectionFilter::pending()
    };
    assert!(filter.matches(&record));

    let other_kind = CorrectionFilter {
      kind: Some(CorrectionKind::Correction),
      ..CorrectionFilter::default()
    };
    assert!(!other_kind.matches(&record));
  }

  #[test]
  fn kind_reflected_in_status() {
    let at = Utc::now();
    let corrected = StoryStatus::Corrected {
      correction_note: "x".into(),
      resolved_at:     at,
    };
    assert!(CorrectionKind::Correction.is_reflected_in(&corrected));
    assert!(!CorrectionKind::Retraction.is_reflected_in(&corrected));
    assert!(!CorrectionKind::Correction.is_reflected_in(&StoryStatus::Published));
  }

  #[test]
  fn corrected_story_can_only_be_retracted() {
    let at = Utc::now();
    let corrected = StoryStatus::Corrected { correction_note: "x".into(), resolved_at: at };
    let retracted = StoryStatus::Retracted { retraction_note: "y".into(), resolved_at: at };

    assert!(CorrectionKind::Correction.can_apply_to(&StoryStatus::Published));
    assert!(CorrectionKind::Retraction.can_apply_to(&StoryStatus::Published));
    assert!(CorrectionKind::Retraction.can_apply_to(&corrected));
    assert!(!CorrectionKind::Correction.can_apply_to(&corrected));
    assert!(!CorrectionKind::Correction.can_apply_to(&retracted));
    assert!(!CorrectionKind::Retraction.can_apply_to(&retracted));
  }

  #[test]
  fn filter_bounds_detection_time() {
    let detected = Utc::now();
    let record = CorrectionRecord::new("2026-03-01-001", CorrectionKind::Correction, "x", detected);
    let window = |after, before| CorrectionFilter {
      detected_after: Some(after),
      detected_before: Some(before),
      ..CorrectionFilter::default()
    };
    let hour = chrono::Duration::hours(1);

    assert!(window(detected, detected + hour).matches(&record));
    assert!(!window(detected - hour, detected).matches(&record));
    assert!(!window(detected + hour, detected + hour * 2).matches(&record));
  }
}
