//! Tunables for one pipeline instance, deserialised from the `[pipeline]`
//! section of the daemon configuration.

use std::{collections::BTreeMap, time::Duration};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// How many days back the correction step looks for published stories,
  /// and the window for duplicate-claim suppression.
  pub lookback_days:          u32,
  /// Extractions with an oracle confidence below this are dropped.
  pub min_confidence:         u8,
  /// Subjective words and phrases a story's wording must not contain.
  pub denylist:               Vec<String>,
  /// Region fallback table: keyword → region tag.
  pub regions:                BTreeMap<String, String>,
  /// Minimum share of shared words before a story/candidate pair is sent to
  /// the contradiction oracle.
  pub overlap_threshold:      f32,
  pub fetch_concurrency:      usize,
  pub extraction_concurrency: usize,
  pub fetch_timeout_secs:     u64,
  pub oracle_timeout_secs:    u64,
  /// Re-apply unapplied correction records from earlier cycles.
  pub replay_pending:         bool,
}

impl PipelineConfig {
  pub fn fetch_timeout(&self) -> Duration { Duration::from_secs(self.fetch_timeout_secs) }

  pub fn oracle_timeout(&self) -> Duration { Duration::from_secs(self.oracle_timeout_secs) }

  pub fn lookback(&self) -> chrono::Duration { chrono::Duration::days(self.lookback_days.into()) }
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      lookback_days:          3,
      min_confidence:         80,
      denylist:               default_denylist(),
      regions:                BTreeMap::new(),
      overlap_threshold:      0.15,
      fetch_concurrency:      8,
      extraction_concurrency: 4,
      fetch_timeout_secs:     20,
      oracle_timeout_secs:    30,
      replay_pending:         true,
    }
  }
}

fn default_denylist() -> Vec<String> {
  [
    "brutal",
    "tragic",
    "shocking",
    "controversial",
    "terrified",
    "slammed",
    "historic",
    "horrific",
    "devastating",
    "outrageous",
    "stunning",
    "chilling",
    "heartbreaking",
    "disgraceful",
    "active shooter",
  ]
  .into_iter()
  .map(str::to_owned)
  .collect()
}
