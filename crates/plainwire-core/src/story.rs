//! Stories, the durable published unit of the ledger.
//!
//! A story's identity and wording never change after publication. Lifecycle
//! transitions (correction, retraction) add a note and a timestamp; the
//! original `fact_text` stays in place for audit.

use std::{fmt, str::FromStr, sync::LazyLock};

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, ValidationError};

// ─── Identifier ──────────────────────────────────────────────────────────────

/// Canonical story identifier: publication date plus a per-date sequence
/// number starting at 1. Rendered as `YYYY-MM-DD-NNN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoryId {
  pub date: NaiveDate,
  pub seq:  u32,
}

impl StoryId {
  pub fn new(date: NaiveDate, seq: u32) -> Self { Self { date, seq } }

  /// The id wrapped in brackets, the form handed to the contradiction oracle
  /// so identifiers stand out from prose.
  pub fn bracketed(&self) -> String { format!("[{self}]") }
}

impl fmt::Display for StoryId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{:03}", self.date.format("%Y-%m-%d"), self.seq)
  }
}

impl FromStr for StoryId {
  type Err = Error;

  /// Parses the bare form only. Run [`normalize_story_id`] first on anything
  /// that came out of an oracle.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || Error::InvalidStoryId(s.to_owned());
    let (date, seq) = s.rsplit_once('-').ok_or_else(invalid)?;
    if seq.len() < 3 || !seq.bytes().all(|b| b.is_ascii_digit()) {
      return Err(invalid());
    }
    let parsed =
      NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| invalid())?;
    // Reject non-canonical spellings such as `2026-3-1`.
    if parsed.format("%Y-%m-%d").to_string() != date {
      return Err(invalid());
    }
    let seq: u32 = seq.parse().map_err(|_| invalid())?;
    if seq == 0 {
      return Err(invalid());
    }
    Ok(Self { date: parsed, seq })
  }
}

impl TryFrom<String> for StoryId {
  type Error = Error;

  fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl From<StoryId> for String {
  fn from(id: StoryId) -> Self { id.to_string() }
}

static EMBEDDED_ID: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\d{4}-\d{2}-\d{2}-\d{3,}").expect("story id pattern is valid")
});

/// Reduce an identifier as echoed by an oracle (or typed by a person) to the
/// ledger's bare `YYYY-MM-DD-NNN` form.
///
/// Every place that interprets, stores, or looks up a story id from outside
/// the ledger goes through this function. It is idempotent.
pub fn normalize_story_id(raw: &str) -> String {
  let trimmed =
    raw.trim_matches(|c: char| !(c.is_ascii_alphanumeric() || c == '-'));
  match EMBEDDED_ID.find(trimmed) {
    Some(m) => m.as_str().to_owned(),
    None => trimmed.to_owned(),
  }
}

// ─── Sources ─────────────────────────────────────────────────────────────────

/// One outlet that reported a story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorySource {
  pub source_name: String,
  pub owner_group: String,
  pub trust_score: f32,
}

/// A story's source list. Always holds at least two entries with pairwise
/// distinct owner groups; there is no way to build one that doesn't,
/// including through deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<StorySource>", into = "Vec<StorySource>")]
pub struct CorroboratedSources(Vec<StorySource>);

impl CorroboratedSources {
  pub fn as_slice(&self) -> &[StorySource] { &self.0 }

  pub fn iter(&self) -> std::slice::Iter<'_, StorySource> { self.0.iter() }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl TryFrom<Vec<StorySource>> for CorroboratedSources {
  type Error = ValidationError;

  fn try_from(sources: Vec<StorySource>) -> Result<Self, Self::Error> {
    validate_sources(&sources)?;
    Ok(Self(sources))
  }
}

impl From<CorroboratedSources> for Vec<StorySource> {
  fn from(sources: CorroboratedSources) -> Self { sources.0 }
}

/// The corroboration invariant: two or more sources, no owner group twice.
pub fn validate_sources(sources: &[StorySource]) -> Result<(), ValidationError> {
  if sources.len() < 2 {
    return Err(ValidationError::TooFewSources(sources.len()));
  }
  for (i, a) in sources.iter().enumerate() {
    for b in &sources[i + 1..] {
      if a.source_name == b.source_name {
        return Err(ValidationError::DuplicateSource(a.source_name.clone()));
      }
      if a.owner_group == b.owner_group {
        return Err(ValidationError::SharedOwnerGroup {
          first:       a.source_name.clone(),
          second:      b.source_name.clone(),
          owner_group: a.owner_group.clone(),
        });
      }
    }
  }
  Ok(())
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle status. `Published` may move to either other state, a
/// corrected story may still be retracted, and nothing leads back to
/// `Published`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StoryStatus {
  Published,
  Corrected {
    correction_note: String,
    resolved_at:     DateTime<Utc>,
  },
  Retracted {
    retraction_note: String,
    resolved_at:     DateTime<Utc>,
  },
}

impl StoryStatus {
  pub fn name(&self) -> &'static str {
    match self {
      Self::Published => "published",
      Self::Corrected { .. } => "corrected",
      Self::Retracted { .. } => "retracted",
    }
  }

  pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
    match self {
      Self::Published => None,
      Self::Corrected { resolved_at, .. } | Self::Retracted { resolved_at, .. } => {
        Some(*resolved_at)
      }
    }
  }
}

/// Status names without payload, for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
  Published,
  Corrected,
  Retracted,
}

impl StatusKind {
  pub fn matches(self, status: &StoryStatus) -> bool {
    matches!(
      (self, status),
      (Self::Published, StoryStatus::Published)
        | (Self::Corrected, StoryStatus::Corrected { .. })
        | (Self::Retracted, StoryStatus::Retracted { .. })
    )
  }
}

// ─── Story ───────────────────────────────────────────────────────────────────

/// A published, corroborated fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
  pub id:           StoryId,
  pub fact_text:    String,
  pub sources:      CorroboratedSources,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub location_tag: Option<String>,
  #[serde(flatten)]
  pub status:       StoryStatus,
  pub published_at: DateTime<Utc>,
  /// Digest of the claim this story was grouped under.
  pub claim_key:    String,
}

// ─── Proposal ────────────────────────────────────────────────────────────────

/// A story the corroboration engine wants published. Unvalidated until the
/// ledger accepts it; the ledger assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryProposal {
  pub fact_text:    String,
  pub sources:      Vec<StorySource>,
  pub location_tag: Option<String>,
  pub claim_key:    String,
  /// The cycle time at which corroboration succeeded; its date becomes the
  /// id's date.
  pub proposed_at:  DateTime<Utc>,
}

impl StoryProposal {
  pub fn validate(&self) -> Result<(), ValidationError> {
    if self.fact_text.trim().is_empty() {
      return Err(ValidationError::EmptyFactText);
    }
    validate_sources(&self.sources)
  }
}
