//! The verification pipeline: extraction, corroboration, publication, and
//! correction/retraction, driven one batch cycle at a time.
//!
//! Everything here is generic over the [`plainwire_core::ledger::StoryLedger`]
//! and oracle traits; concrete backends are wired up by the daemon.

pub mod config;
pub mod correct;
pub mod corroborate;
pub mod cycle;
pub mod error;
pub mod extract;

pub use config::PipelineConfig;
pub use cycle::{CycleContext, CycleReport, CycleStep, Pipeline};
pub use error::CycleError;

#[cfg(test)]
mod fakes;
