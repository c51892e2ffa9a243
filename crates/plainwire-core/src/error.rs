//! Error types for `plainwire-core`.

use thiserror::Error;

use crate::correction::CorrectionKind;

/// Why a proposal or a source catalog failed validation.
///
/// Validation failures are expected and frequent: they are logged at info
/// level and never abort a cycle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
  #[error("a story needs at least 2 sources, got {0}")]
  TooFewSources(usize),

  #[error("sources {first:?} and {second:?} share owner group {owner_group:?}")]
  SharedOwnerGroup {
    first:       String,
    second:      String,
    owner_group: String,
  },

  #[error("fact text is empty")]
  EmptyFactText,

  #[error("fact text contains disallowed term {0:?}")]
  DisallowedTerm(String),

  #[error("source {0:?} is listed more than once")]
  DuplicateSource(String),

  #[error("trust score {score} for source {name:?} is outside 0..=100")]
  TrustScoreOutOfRange { name: String, score: f32 },
}

#[derive(Debug, Error)]
pub enum Error {
  /// A correction target did not resolve to any story after normalization.
  #[error("story {0} does not exist")]
  Resolution(String),

  /// The ledger reported success but the story's status did not change.
  #[error("story {id} is still {actual} after applying a {kind}")]
  VerificationMismatch {
    id:     String,
    kind:   CorrectionKind,
    actual: String,
  },

  #[error("oracle failure: {0}")]
  Oracle(String),

  #[error("fetching headlines from {source_name} failed: {reason}")]
  SourceFetch { source_name: String, reason: String },

  #[error("invalid story id: {0:?}")]
  InvalidStoryId(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
