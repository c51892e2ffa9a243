//! Capability interfaces for the external collaborators the core depends on.
//!
//! The fact-extraction and contradiction-check oracles are black boxes with a
//! contract: fallible, possibly slow, and not deterministic across calls. The
//! headline feed stands in for the scraping layer. Each is injected into the
//! pipeline so tests can substitute fakes.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{candidate::Headline, source::Source};

// ─── Extraction ──────────────────────────────────────────────────────────────

/// What the extraction oracle found in a headline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFact {
  pub extracted_claim: String,
  pub cleaned_text:    String,
  #[serde(default)]
  pub location_tag:    Option<String>,
  #[serde(default)]
  pub cluster_key:     Option<String>,
  /// Oracle's confidence (0–100) that `cleaned_text` is purely factual.
  #[serde(default)]
  pub confidence:      Option<u8>,
  /// Oracle's judgement of whether the event clears the newsworthiness bar.
  #[serde(default)]
  pub newsworthy:      Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Extraction {
  Fact(ExtractedFact),
  /// The headline holds nothing verifiable.
  NoFact,
}

pub trait FactExtractor: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn extract<'a>(
    &'a self,
    headline: &'a Headline,
    source: &'a Source,
  ) -> impl Future<Output = Result<Extraction, Self::Error>> + Send + 'a;
}

// ─── Contradiction check ─────────────────────────────────────────────────────

/// Input to the contradiction oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContradictionQuery {
  /// The story id in bracketed form, e.g. `[2026-03-01-001]`.
  pub story_id:       String,
  pub fact_text:      String,
  pub candidate_text: String,
}

/// The oracle's classification. `target_id` is echoed back by the oracle and
/// may still carry delimiters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ContradictionVerdict {
  NoConflict,
  Correction { target_id: String, reason: String },
  Retraction { target_id: String, reason: String },
}

pub trait ContradictionChecker: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn check<'a>(
    &'a self,
    query: &'a ContradictionQuery,
  ) -> impl Future<Output = Result<ContradictionVerdict, Self::Error>> + Send + 'a;
}

// ─── Headline feed ───────────────────────────────────────────────────────────

/// Delivers the current headlines for one outlet.
pub trait HeadlineFeed: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn fetch<'a>(
    &'a self,
    source: &'a Source,
  ) -> impl Future<Output = Result<Vec<Headline>, Self::Error>> + Send + 'a;
}
