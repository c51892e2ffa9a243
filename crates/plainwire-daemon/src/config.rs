//! Daemon configuration, layered from an optional TOML file and
//! `PLAINWIRE__*` environment variables.
//!
//! ```text
//! PLAINWIRE__ORACLE__BASE_URL=http://oracle:9000
//! PLAINWIRE__PIPELINE__MIN_CONFIDENCE=85
//! ```

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use config::{
  Config, ConfigError, Environment, File, FileFormat,
  builder::{ConfigBuilder, DefaultState},
};
use plainwire_core::{
  ValidationError,
  source::{Source, SourceRegistry},
};
use plainwire_pipeline::PipelineConfig;
use serde::Deserialize;

// ─── Sections ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
  /// Directory holding `stories.json` and `corrections.json`.
  #[serde(default = "default_data_dir")]
  pub data_dir:           PathBuf,
  /// Directory the scraper drops `<source id>.json` headline files into.
  #[serde(default = "default_inbox_dir")]
  pub inbox_dir:          PathBuf,
  #[serde(default = "default_interval_minutes")]
  pub interval_minutes:   u64,
  /// Wait before the next cycle after a failed one.
  #[serde(default = "default_error_backoff_secs")]
  pub error_backoff_secs: u64,
  /// When this file exists the run loop stops before starting a cycle.
  #[serde(default)]
  pub kill_switch:        Option<PathBuf>,
  pub oracle:             OracleConfig,
  #[serde(default)]
  pub api:                ApiConfig,
  #[serde(default)]
  pub pipeline:           PipelineConfig,
  #[serde(default)]
  pub registry:           RegistryConfig,
  #[serde(default)]
  pub sources:            Vec<Source>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
  pub base_url:     String,
  /// Sent as a bearer token when set.
  #[serde(default)]
  pub api_key:      Option<String>,
  /// Transport-level timeout. The pipeline applies its own, usually
  /// shorter, per-call timeout on top.
  #[serde(default = "default_oracle_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub host: String,
  pub port: u16,
}

impl Default for ApiConfig {
  fn default() -> Self { Self { host: "127.0.0.1".into(), port: 8080 } }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryConfig {
  /// Sources whose owners share at least this many institutional holders
  /// are not treated as independent.
  pub max_shared_holders: Option<usize>,
}

fn default_data_dir() -> PathBuf { PathBuf::from("data") }

fn default_inbox_dir() -> PathBuf { PathBuf::from("inbox") }

fn default_interval_minutes() -> u64 { 30 }

fn default_error_backoff_secs() -> u64 { 60 }

fn default_oracle_timeout_secs() -> u64 { 60 }

// ─── Loading ─────────────────────────────────────────────────────────────────

impl DaemonConfig {
  /// Read `path` (if it exists) and overlay the environment.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    Self::build(Config::builder().add_source(File::from(path).required(false)))
  }

  /// Parse a TOML document, overlaid with the environment like [`Self::load`].
  pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
    Self::build(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
  }

  fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
    builder
      .add_source(Environment::with_prefix("PLAINWIRE").separator("__"))
      .build()?
      .try_deserialize()
  }

  pub fn registry(&self) -> Result<SourceRegistry, ValidationError> {
    SourceRegistry::new(self.sources.clone(), self.registry.max_shared_holders)
  }

  pub fn data_dir(&self) -> PathBuf { expand_tilde(&self.data_dir) }

  pub fn inbox_dir(&self) -> PathBuf { expand_tilde(&self.inbox_dir) }

  pub fn interval(&self) -> Duration { Duration::from_secs(self.interval_minutes * 60) }

  pub fn error_backoff(&self) -> Duration { Duration::from_secs(self.error_backoff_secs) }

  pub fn kill_switch_engaged(&self) -> bool {
    self
      .kill_switch
      .as_deref()
      .is_some_and(|path| expand_tilde(path).exists())
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
