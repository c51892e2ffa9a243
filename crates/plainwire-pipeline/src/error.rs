//! Cycle-level errors.
//!
//! Validation, resolution, and verification problems are recovered inside a
//! cycle and only show up as counts in the report. What remains here is
//! fatal to the cycle: the ledger could not be read or written.

use thiserror::Error;

use crate::cycle::{CycleReport, CycleStep};

#[derive(Debug, Error)]
pub enum CycleError {
  #[error("another cycle is already running")]
  AlreadyRunning,

  /// Stories published before the failure stay published; `report` says
  /// which ones.
  #[error("cycle {} failed during {step}: {source}", .report.cycle_id)]
  Ledger {
    step:   CycleStep,
    report: Box<CycleReport>,
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

impl CycleError {
  pub(crate) fn ledger<E>(step: CycleStep, report: &CycleReport, source: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Ledger { step, report: Box::new(report.clone()), source: Box::new(source) }
  }
}
