//! Headlines and candidate facts: the ephemeral, per-cycle inputs.
//!
//! Neither type is ever persisted on its own. A candidate either contributes
//! to a published story or is dropped at the end of the cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A raw headline as delivered by the headline feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headline {
  pub source_name: String,
  pub text:        String,
  pub observed_at: DateTime<Utc>,
}

impl Headline {
  /// Short digest of the source and the wording (case and spacing
  /// ignored). Keys the per-day cache of extraction answers.
  pub fn fingerprint(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.source_name.as_bytes());
    hasher.update([0]);
    hasher.update(collapse(&self.text).as_bytes());
    hex::encode(&hasher.finalize()[..6])
  }
}

/// A fact the extraction oracle pulled out of a single headline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFact {
  pub raw_text:        String,
  /// The claim as the oracle phrased it; used for grouping when no
  /// `cluster_key` is supplied.
  pub extracted_claim: String,
  /// De-editorialized wording, eligible to become a story's `fact_text`.
  pub cleaned_text:    String,
  pub source_name:     String,
  pub observed_at:     DateTime<Utc>,
  pub location_tag:    Option<String>,
  /// Oracle-provided clustering key for semantically equivalent claims.
  pub cluster_key:     Option<String>,
}

impl CandidateFact {
  /// The key candidates are grouped by: the oracle's clustering key if it
  /// gave one, otherwise the claim lowercased with whitespace collapsed.
  pub fn grouping_key(&self) -> String {
    match self.cluster_key.as_deref().map(str::trim) {
      Some(key) if !key.is_empty() => format!("cluster:{}", key.to_lowercase()),
      _ => format!("claim:{}", collapse(&self.extracted_claim)),
    }
  }
}

/// Stable short digest of a grouping key. Stories remember it so the same
/// claim is not published twice.
pub fn claim_key(grouping_key: &str) -> String {
  let hash = Sha256::digest(grouping_key.as_bytes());
  hex::encode(&hash[..8])
}

fn collapse(text: &str) -> String {
  text
    .split_whitespace()
    .map(str::to_lowercase)
    .collect::<Vec<_>>()
    .join(" ")
}
