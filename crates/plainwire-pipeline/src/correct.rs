//! The correction/retraction engine.
//!
//! Compares this cycle's candidates against recently published stories via
//! the contradiction oracle, records every detection in the correction log
//! before touching the story, applies it, and then re-reads the story to
//! confirm the status really changed. A record is only marked applied after
//! that confirmation.
//!
//! Pending records from earlier cycles are replayed while they are inside the
//! lookback window and their target could still take the transition. They
//! stay in the log either way.
//!
//! Story ids cross the oracle boundary as text. Every id the oracle hands
//! back goes through [`normalize_story_id`] before it is compared, stored,
//! or looked up.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use plainwire_core::{
  Error,
  candidate::{CandidateFact, claim_key},
  correction::{CorrectionFilter, CorrectionKind, CorrectionRecord},
  ledger::{StoryFilter, StoryLedger},
  oracle::{ContradictionChecker, ContradictionQuery, ContradictionVerdict},
  story::{StatusKind, Story, StoryId, normalize_story_id},
};
use serde::Serialize;
use tokio::time::timeout;

use crate::PipelineConfig;

/// Counters for the correction step.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CorrectionSummary {
  /// Story/candidate pairs sent to the oracle.
  pub checked:         usize,
  pub oracle_failures: usize,
  /// New records written to the log.
  pub detected:        usize,
  /// Detections already present in the log, not recorded again.
  pub already_logged:  usize,
  /// Records confirmed applied (new and replayed).
  pub applied:         usize,
  /// Records whose target did not resolve to a story.
  pub unresolved:      usize,
  /// Records the ledger accepted but whose story did not change.
  pub mismatched:      usize,
  /// Transitions confirmed on the story whose log record could not be
  /// marked applied.
  pub unrecorded:      usize,
  /// Pending records from earlier cycles that were re-applied.
  pub replayed:        usize,
  /// Replayed records that are still not applied.
  pub still_pending:   usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApplyOutcome {
  Applied,
  Unresolved,
  Mismatch,
  Unrecorded,
}

pub struct CorrectionEngine<'a, L, C> {
  ledger:  &'a L,
  checker: &'a C,
  config:  &'a PipelineConfig,
}

impl<'a, L, C> CorrectionEngine<'a, L, C>
where
  L: StoryLedger,
  C: ContradictionChecker,
{
  pub fn new(ledger: &'a L, checker: &'a C, config: &'a PipelineConfig) -> Self {
    Self { ledger, checker, config }
  }

  /// Re-apply records from earlier cycles that never got confirmed.
  ///
  /// Only records detected inside the lookback window and before `now` are
  /// considered, so a detection is never retried in the cycle that produced
  /// it. Outcomes other than success count as `still_pending`; the
  /// `unresolved` and `mismatched` counters only describe new detections.
  pub async fn replay_pending(
    &self,
    now: DateTime<Utc>,
    summary: &mut CorrectionSummary,
  ) -> Result<(), L::Error> {
    let filter = CorrectionFilter {
      detected_after: Some(now - self.config.lookback()),
      detected_before: Some(now),
      ..CorrectionFilter::pending()
    };
    let pending = self.ledger.corrections(&filter).await?;
    for record in pending {
      if !self.replayable(&record).await? {
        continue;
      }
      tracing::info!(
        record = %record.record_id,
        target = %record.target_story_id,
        kind = %record.kind,
        "replaying pending correction"
      );
      summary.replayed += 1;
      match self.apply(&record, now).await? {
        ApplyOutcome::Applied => summary.applied += 1,
        ApplyOutcome::Unrecorded => summary.unrecorded += 1,
        ApplyOutcome::Unresolved | ApplyOutcome::Mismatch => summary.still_pending += 1,
      }
    }
    Ok(())
  }

  /// Whether another attempt could change anything: the target has to be a
  /// story id, and if the story exists it must still accept the transition.
  async fn replayable(&self, record: &CorrectionRecord) -> Result<bool, L::Error> {
    if record.target_story_id.parse::<StoryId>().is_err() {
      tracing::debug!(
        record = %record.record_id,
        target = %record.target_story_id,
        "pending correction target is not a story id; not replayed"
      );
      return Ok(false);
    }
    let Some(story) = self.ledger.get(&record.target_story_id).await? else {
      return Ok(true);
    };
    let open = record.kind.is_reflected_in(&story.status) || record.kind.can_apply_to(&story.status);
    if !open {
      tracing::debug!(
        record = %record.record_id,
        target = %story.id,
        status = story.status.name(),
        "story can no longer take this transition; not replayed"
      );
    }
    Ok(open)
  }

  /// Check recently published stories against `candidates` and apply
  /// whatever the oracle flags.
  ///
  /// Corrected stories stay in the window because they can still be
  /// retracted; retracted stories are final and are not checked.
  pub async fn detect(
    &self,
    candidates: &[CandidateFact],
    now: DateTime<Utc>,
    summary: &mut CorrectionSummary,
  ) -> Result<(), L::Error> {
    let window = StoryFilter {
      published_after: Some(now - self.config.lookback()),
      ..StoryFilter::default()
    };
    let stories: Vec<Story> = self
      .ledger
      .list(&window)
      .await?
      .into_iter()
      .filter(|s| !StatusKind::Retracted.matches(&s.status))
      .collect();

    // Targets already acted on this cycle; one transition per story.
    let mut handled: HashSet<String> = HashSet::new();

    for story in &stories {
      for candidate in candidates {
        if handled.contains(&story.id.to_string()) {
          break;
        }
        if !self.worth_checking(story, candidate) {
          continue;
        }

        let Some((kind, target, reason)) = self.ask_oracle(story, candidate, summary).await
        else {
          continue;
        };

        let target_id = normalize_story_id(&target);
        if target_id == story.id.to_string() && !kind.can_apply_to(&story.status) {
          tracing::debug!(target = %target_id, %kind, status = story.status.name(), "already resolved");
          continue;
        }
        if !handled.insert(target_id.clone()) {
          continue;
        }

        let logged = self
          .ledger
          .corrections(&CorrectionFilter {
            target_story_id: Some(target_id.clone()),
            kind: Some(kind),
            ..CorrectionFilter::default()
          })
          .await?;
        if !logged.is_empty() {
          tracing::debug!(target = %target_id, %kind, "detection already logged");
          summary.already_logged += 1;
          continue;
        }

        let record = self
          .ledger
          .record_correction(CorrectionRecord::new(&target, kind, reason, now))
          .await?;
        summary.detected += 1;
        tracing::info!(
          record = %record.record_id,
          target = %record.target_story_id,
          %kind,
          reason = %record.reason,
          "contradiction detected"
        );

        let outcome = self.apply(&record, now).await?;
        tally(summary, outcome);
      }
    }
    Ok(())
  }

  /// Skip pairs that can't plausibly conflict: the candidate restates the
  /// story's own claim, or the two share too few words.
  fn worth_checking(&self, story: &Story, candidate: &CandidateFact) -> bool {
    if claim_key(&candidate.grouping_key()) == story.claim_key {
      return false;
    }
    word_overlap(&story.fact_text, &candidate.cleaned_text, self.config.overlap_threshold)
  }

  async fn ask_oracle(
    &self,
    story: &Story,
    candidate: &CandidateFact,
    summary: &mut CorrectionSummary,
  ) -> Option<(CorrectionKind, String, String)> {
    let query = ContradictionQuery {
      story_id:       story.id.bracketed(),
      fact_text:      story.fact_text.clone(),
      candidate_text: candidate.cleaned_text.clone(),
    };
    summary.checked += 1;

    let limit = self.config.oracle_timeout();
    let verdict = match timeout(limit, self.checker.check(&query)).await {
      Ok(Ok(verdict)) => verdict,
      Ok(Err(e)) => {
        let err = Error::Oracle(e.to_string());
        tracing::warn!(%err, story = %story.id, "contradiction check failed");
        summary.oracle_failures += 1;
        return None;
      }
      Err(_) => {
        let err = Error::Oracle(format!("contradiction check timed out after {limit:?}"));
        tracing::warn!(%err, story = %story.id, "contradiction check failed");
        summary.oracle_failures += 1;
        return None;
      }
    };

    match verdict {
      ContradictionVerdict::NoConflict => None,
      ContradictionVerdict::Correction { target_id, reason } => {
        Some((CorrectionKind::Correction, target_id, reason))
      }
      ContradictionVerdict::Retraction { target_id, reason } => {
        Some((CorrectionKind::Retraction, target_id, reason))
      }
    }
  }

  /// Apply a logged record, then verify against a fresh read of the story.
  async fn apply(&self, record: &CorrectionRecord, now: DateTime<Utc>) -> Result<ApplyOutcome, L::Error> {
    let accepted = match record.kind {
      CorrectionKind::Correction => self.ledger.apply_correction(record).await?,
      CorrectionKind::Retraction => self.ledger.apply_retraction(record).await?,
    };

    let Some(story) = self.ledger.get(&record.target_story_id).await? else {
      let err = Error::Resolution(record.target_story_id.clone());
      tracing::warn!(%err, record = %record.record_id, "correction left unapplied");
      return Ok(ApplyOutcome::Unresolved);
    };

    if !record.kind.is_reflected_in(&story.status) {
      let err = Error::VerificationMismatch {
        id:     story.id.to_string(),
        kind:   record.kind,
        actual: story.status.name().to_owned(),
      };
      tracing::warn!(
        %err,
        record = %record.record_id,
        ledger_accepted = accepted,
        "correction not reflected in ledger; needs review"
      );
      return Ok(ApplyOutcome::Mismatch);
    }

    if !self.ledger.mark_applied(record.record_id, now).await? {
      tracing::warn!(
        record = %record.record_id,
        target = %story.id,
        "transition confirmed but the record is missing from the correction log"
      );
      return Ok(ApplyOutcome::Unrecorded);
    }
    Ok(ApplyOutcome::Applied)
  }
}

fn tally(summary: &mut CorrectionSummary, outcome: ApplyOutcome) {
  match outcome {
    ApplyOutcome::Applied => summary.applied += 1,
    ApplyOutcome::Unresolved => summary.unresolved += 1,
    ApplyOutcome::Mismatch => summary.mismatched += 1,
    ApplyOutcome::Unrecorded => summary.unrecorded += 1,
  }
}

/// Whether at least `threshold` of the shorter text's distinct words (three
/// letters or more) also appear in the other text.
pub fn word_overlap(a: &str, b: &str, threshold: f32) -> bool {
  let significant = |text: &str| -> HashSet<String> {
    plainwire_core::text::words(text)
      .into_iter()
      .filter(|w| w.chars().count() >= 3)
      .collect()
  };
  let (a, b) = (significant(a), significant(b));
  if a.is_empty() || b.is_empty() {
    return false;
  }
  let shared = a.intersection(&b).count();
  shared as f32 >= a.len().min(b.len()) as f32 * threshold
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn overlap_requires_shared_words() {
    assert!(word_overlap(
      "Bridge in Springfield closes for repairs.",
      "Springfield bridge reopens after repairs.",
      0.15
    ));
    assert!(!word_overlap(
      "Bridge in Springfield closes for repairs.",
      "Central bank raises interest rates.",
      0.15
    ));
  }

  #[test]
  fn overlap_ignores_short_words_and_empty_text() {
    assert!(!word_overlap("a to of", "a to of", 0.1));
    assert!(!word_overlap("", "Bridge closes", 0.0));
  }

  #[test]
  fn zero_threshold_accepts_any_pair_with_words() {
    assert!(word_overlap("Bridge closes", "Bank raises rates", 0.0));
  }
}
