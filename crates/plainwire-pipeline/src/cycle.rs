//! One batch cycle: acquire, extract, corroborate, publish, correct, persist.
//!
//! Only one cycle runs at a time per [`Pipeline`]. Candidates live for the
//! duration of the cycle and are dropped when it ends. Headlines already
//! extracted earlier the same day reuse the cached oracle answer, so they
//! still take part in corroboration; only newly extracted candidates are
//! checked for contradictions. A cycle caches its new answers only once it
//! has run to the end.

use std::{
  fmt,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use chrono::{DateTime, Utc};
use plainwire_core::{
  candidate::CandidateFact,
  ledger::{PublishError, StoryFilter, StoryLedger},
  oracle::{ContradictionChecker, FactExtractor, HeadlineFeed},
  source::SourceRegistry,
  story::{StoryId, StoryProposal},
};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
  CycleError, PipelineConfig,
  correct::{CorrectionEngine, CorrectionSummary},
  corroborate::{RejectReason, Rejection, corroborate},
  extract::{ExtractStats, Extracted, acquire, extract_candidates},
};

// ─── Context ─────────────────────────────────────────────────────────────────

/// Per-cycle identity, the cycle's notion of "now", and an abort flag that
/// is checked between steps.
#[derive(Debug, Clone)]
pub struct CycleContext {
  pub cycle_id:   Uuid,
  pub started_at: DateTime<Utc>,
  abort:          Arc<AtomicBool>,
}

impl CycleContext {
  pub fn new(started_at: DateTime<Utc>) -> Self {
    Self { cycle_id: Uuid::new_v4(), started_at, abort: Arc::default() }
  }

  /// Share an abort flag owned by the caller (e.g. a shutdown handler).
  pub fn with_abort(mut self, abort: Arc<AtomicBool>) -> Self {
    self.abort = abort;
    self
  }

  pub fn abort(&self) { self.abort.store(true, Ordering::SeqCst); }

  pub fn is_aborted(&self) -> bool { self.abort.load(Ordering::SeqCst) }
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStep {
  Acquire,
  Extract,
  Corroborate,
  Publish,
  Correct,
  Persist,
}

impl fmt::Display for CycleStep {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Acquire => "acquire",
      Self::Extract => "extract",
      Self::Corroborate => "corroborate",
      Self::Publish => "publish",
      Self::Correct => "correct",
      Self::Persist => "persist",
    })
  }
}

/// What a cycle did. Also carried by [`CycleError::Ledger`] so a failed
/// cycle still reports the stories it published before failing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
  pub cycle_id:          Uuid,
  pub started_at:        DateTime<Utc>,
  pub finished_at:       Option<DateTime<Utc>>,
  pub headlines:         usize,
  /// Headlines answered from today's extraction cache.
  pub already_processed: usize,
  pub failed_sources:    Vec<String>,
  pub candidates:        usize,
  /// Candidates extracted this cycle rather than taken from the cache.
  pub fresh_candidates:  usize,
  pub extraction:        ExtractStats,
  pub proposals:         usize,
  pub published:         Vec<StoryId>,
  pub rejected:          Vec<Rejection>,
  /// Proposals skipped because the claim was already published within the
  /// lookback window.
  pub duplicates:        usize,
  pub corrections:       CorrectionSummary,
  /// Set when the abort flag stopped the cycle after this step.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub aborted_after:     Option<CycleStep>,
}

impl CycleReport {
  fn new(ctx: &CycleContext) -> Self {
    Self { cycle_id: ctx.cycle_id, started_at: ctx.started_at, ..Self::default() }
  }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

pub struct Pipeline<L, X, C, F> {
  ledger:     L,
  extractor:  X,
  checker:    C,
  feed:       F,
  registry:   SourceRegistry,
  config:     PipelineConfig,
  cycle_lock: Mutex<()>,
}

impl<L, X, C, F> Pipeline<L, X, C, F>
where
  L: StoryLedger,
  X: FactExtractor,
  C: ContradictionChecker,
  F: HeadlineFeed,
{
  pub fn new(
    ledger: L,
    extractor: X,
    checker: C,
    feed: F,
    registry: SourceRegistry,
    config: PipelineConfig,
  ) -> Self {
    Self { ledger, extractor, checker, feed, registry, config, cycle_lock: Mutex::new(()) }
  }

  pub fn ledger(&self) -> &L { &self.ledger }

  pub fn registry(&self) -> &SourceRegistry { &self.registry }

  pub fn config(&self) -> &PipelineConfig { &self.config }

  /// Run one full cycle. Fails immediately with
  /// [`CycleError::AlreadyRunning`] if another cycle holds the lock.
  pub async fn run_cycle(&self, ctx: &CycleContext) -> Result<CycleReport, CycleError> {
    let Ok(_running) = self.cycle_lock.try_lock() else {
      return Err(CycleError::AlreadyRunning);
    };

    tracing::info!(cycle = %ctx.cycle_id, sources = self.registry.len(), "cycle started");
    let mut report = CycleReport::new(ctx);
    if let Err(err) = self.steps(ctx, &mut report).await {
      tracing::error!(
        cycle = %ctx.cycle_id,
        %err,
        published = report.published.len(),
        "cycle partially failed"
      );
      return Err(err);
    }

    report.finished_at = Some(Utc::now());
    tracing::info!(
      cycle = %ctx.cycle_id,
      headlines = report.headlines,
      already_processed = report.already_processed,
      candidates = report.candidates,
      published = report.published.len(),
      rejected = report.rejected.len(),
      duplicates = report.duplicates,
      corrections_applied = report.corrections.applied,
      aborted = report.aborted_after.is_some(),
      "cycle finished"
    );
    Ok(report)
  }

  /// Re-apply pending correction records without running a full cycle.
  pub async fn replay_pending(&self, ctx: &CycleContext) -> Result<CorrectionSummary, CycleError> {
    let Ok(_running) = self.cycle_lock.try_lock() else {
      return Err(CycleError::AlreadyRunning);
    };

    let mut report = CycleReport::new(ctx);
    let engine = CorrectionEngine::new(&self.ledger, &self.checker, &self.config);
    engine
      .replay_pending(ctx.started_at, &mut report.corrections)
      .await
      .map_err(|e| CycleError::ledger(CycleStep::Correct, &report, e))?;
    self
      .ledger
      .flush()
      .await
      .map_err(|e| CycleError::ledger(CycleStep::Persist, &report, e))?;

    tracing::info!(
      replayed = report.corrections.replayed,
      applied = report.corrections.applied,
      "replay finished"
    );
    Ok(report.corrections)
  }

  async fn steps(&self, ctx: &CycleContext, report: &mut CycleReport) -> Result<(), CycleError> {
    let now = ctx.started_at;
    let day = now.date_naive();

    let acquired = acquire(&self.feed, &self.registry, &self.config).await;
    report.headlines = acquired.headlines.len();
    report.failed_sources = acquired.failed_sources;
    let cache = self
      .ledger
      .processed_headlines(day)
      .await
      .map_err(|e| CycleError::ledger(CycleStep::Acquire, report, e))?;
    if stopped(ctx, report, CycleStep::Acquire) {
      return Ok(());
    }

    let Extracted { candidates, fresh, stats, answers, reused } = extract_candidates(
      &self.extractor,
      &self.registry,
      &acquired.headlines,
      &cache,
      &self.config,
    )
    .await;
    report.already_processed = reused;
    report.candidates = candidates.len();
    report.fresh_candidates = fresh.len();
    report.extraction = stats;
    if reused > 0 {
      tracing::debug!(reused, "headlines answered from today's cache");
    }
    if stopped(ctx, report, CycleStep::Extract) {
      return Ok(());
    }

    let outcome = corroborate(&candidates, &self.registry, &self.config, now);
    report.proposals = outcome.proposals.len();
    report.rejected = outcome.rejected;
    if stopped(ctx, report, CycleStep::Corroborate) {
      return Ok(());
    }

    self.publish_all(outcome.proposals, now, report).await?;
    if stopped(ctx, report, CycleStep::Publish) {
      return Ok(());
    }

    self.correct(&fresh, now, report).await?;
    if stopped(ctx, report, CycleStep::Correct) {
      return Ok(());
    }

    self
      .ledger
      .mark_processed(day, &answers)
      .await
      .map_err(|e| CycleError::ledger(CycleStep::Persist, report, e))?;
    self
      .ledger
      .flush()
      .await
      .map_err(|e| CycleError::ledger(CycleStep::Persist, report, e))
  }

  async fn publish_all(
    &self,
    proposals: Vec<StoryProposal>,
    now: DateTime<Utc>,
    report: &mut CycleReport,
  ) -> Result<(), CycleError> {
    for proposal in proposals {
      let recent = StoryFilter {
        claim_key: Some(proposal.claim_key.clone()),
        published_after: Some(now - self.config.lookback()),
        limit: Some(1),
        ..StoryFilter::default()
      };
      let existing = self
        .ledger
        .list(&recent)
        .await
        .map_err(|e| CycleError::ledger(CycleStep::Publish, report, e))?;
      if let Some(story) = existing.first() {
        tracing::debug!(existing = %story.id, claim_key = %proposal.claim_key, "claim already published");
        report.duplicates += 1;
        continue;
      }

      let claim_key = proposal.claim_key.clone();
      let claim = proposal.fact_text.clone();
      match self.ledger.publish(proposal).await {
        Ok(story) => {
          tracing::info!(id = %story.id, sources = story.sources.len(), "published story");
          report.published.push(story.id);
        }
        Err(PublishError::Validation(err)) => {
          tracing::info!(%err, %claim, "ledger rejected proposal");
          report.rejected.push(Rejection {
            claim_key,
            claim,
            reason: RejectReason::Invalid { detail: err.to_string() },
          });
        }
        Err(PublishError::Store(e)) => {
          return Err(CycleError::ledger(CycleStep::Publish, report, e));
        }
      }
    }
    Ok(())
  }

  async fn correct(
    &self,
    candidates: &[CandidateFact],
    now: DateTime<Utc>,
    report: &mut CycleReport,
  ) -> Result<(), CycleError> {
    let engine = CorrectionEngine::new(&self.ledger, &self.checker, &self.config);
    if self.config.replay_pending {
      engine
        .replay_pending(now, &mut report.corrections)
        .await
        .map_err(|e| CycleError::ledger(CycleStep::Correct, report, e))?;
    }
    engine
      .detect(candidates, now, &mut report.corrections)
      .await
      .map_err(|e| CycleError::ledger(CycleStep::Correct, report, e))
  }
}

fn stopped(ctx: &CycleContext, report: &mut CycleReport, step: CycleStep) -> bool {
  if !ctx.is_aborted() {
    return false;
  }
  tracing::warn!(cycle = %ctx.cycle_id, after = %step, "cycle aborted");
  report.aborted_after = Some(step);
  true
}
