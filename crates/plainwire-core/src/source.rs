//! Source registry: the static catalog of outlets allowed to contribute.
//!
//! Sources are loaded once at startup and never change while the process runs.
//! Two sources may corroborate each other only if they are independent: a
//! different `owner_group`, and (optionally) not too many shared institutional
//! holders.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// A news outlet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
  /// Short slug; the headline feed uses it to locate this outlet's headlines.
  pub id:                    String,
  /// Display name; this is what stories and candidates reference.
  pub name:                  String,
  /// Ultimate owner. Sources with the same owner never corroborate each other.
  pub owner_group:           String,
  /// Accuracy rating, `0.0..=100.0`.
  pub trust_score:           f32,
  /// Top institutional shareholders of the owner, if known.
  #[serde(default)]
  pub institutional_holders: Vec<String>,
}

/// Immutable lookup table of [`Source`]s keyed by name.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
  sources:            Vec<Source>,
  by_name:            HashMap<String, usize>,
  /// Two sources sharing at least this many institutional holders are
  /// treated as related. `None` disables the rule.
  max_shared_holders: Option<usize>,
}

impl SourceRegistry {
  /// Build a registry, rejecting duplicate names and out-of-range trust
  /// scores.
  pub fn new(
    sources: Vec<Source>,
    max_shared_holders: Option<usize>,
  ) -> Result<Self, ValidationError> {
    let mut by_name = HashMap::with_capacity(sources.len());
    for (idx, source) in sources.iter().enumerate() {
      if !(0.0..=100.0).contains(&source.trust_score) {
        return Err(ValidationError::TrustScoreOutOfRange {
          name:  source.name.clone(),
          score: source.trust_score,
        });
      }
      if by_name.insert(source.name.clone(), idx).is_some() {
        return Err(ValidationError::DuplicateSource(source.name.clone()));
      }
    }
    Ok(Self { sources, by_name, max_shared_holders })
  }

  pub fn get(&self, name: &str) -> Option<&Source> {
    self.by_name.get(name).map(|&idx| &self.sources[idx])
  }

  pub fn iter(&self) -> impl Iterator<Item = &Source> { self.sources.iter() }

  pub fn len(&self) -> usize { self.sources.len() }

  pub fn is_empty(&self) -> bool { self.sources.is_empty() }

  /// Whether two named sources may corroborate each other.
  ///
  /// Unknown sources are never independent of anything.
  pub fn are_independent(&self, a: &str, b: &str) -> bool {
    let (Some(a), Some(b)) = (self.get(a), self.get(b)) else {
      return false;
    };
    if a.owner_group == b.owner_group {
      return false;
    }
    match self.max_shared_holders {
      Some(max) => shared_holders(a, b) < max,
      None => true,
    }
  }
}

fn shared_holders(a: &Source, b: &Source) -> usize {
  let a: BTreeSet<&str> =
    a.institutional_holders.iter().map(String::as_str).collect();
  b.institutional_holders
    .iter()
    .map(String::as_str)
    .collect::<BTreeSet<_>>()
    .intersection(&a)
    .count()
}
