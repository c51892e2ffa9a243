//! The corroboration engine.
//!
//! Groups a cycle's candidate facts by claim, keeps the groups reported by at
//! least two independent owners, elects the canonical wording, and turns each
//! surviving group into a [`StoryProposal`]. It never touches the ledger;
//! groups that fall short are dropped for this cycle and are only
//! reconsidered if they show up again in a later one.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use plainwire_core::{
  ValidationError,
  candidate::{CandidateFact, claim_key},
  region::derive_location_tag,
  source::{Source, SourceRegistry},
  story::{StoryProposal, StorySource},
  text::find_phrase,
};
use serde::Serialize;

use crate::PipelineConfig;

/// Why a candidate group did not become a proposal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
  /// Fewer than two mutually independent sources reported the claim.
  Uncorroborated { owner_groups: usize },
  /// The elected wording failed validation (e.g. a denylisted term).
  Invalid { detail: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
  pub claim_key: String,
  pub claim:     String,
  #[serde(flatten)]
  pub reason:    RejectReason,
}

#[derive(Debug, Default)]
pub struct CorroborationOutcome {
  pub proposals: Vec<StoryProposal>,
  pub rejected:  Vec<Rejection>,
}

/// One contributing candidate, joined with its registry entry.
struct Member<'a> {
  candidate: &'a CandidateFact,
  source:    &'a Source,
}

/// Turn this cycle's candidates into story proposals. Groups are processed
/// in the order their first candidate appears.
pub fn corroborate(
  candidates: &[CandidateFact],
  registry: &SourceRegistry,
  config: &PipelineConfig,
  now: DateTime<Utc>,
) -> CorroborationOutcome {
  let mut outcome = CorroborationOutcome::default();

  for (key, group) in group_candidates(candidates) {
    let claim = group[0].extracted_claim.clone();
    match corroborate_group(&key, &group, registry, config, now) {
      Ok(proposal) => outcome.proposals.push(proposal),
      Err(reason) => {
        tracing::info!(%claim, ?reason, "claim not corroborated");
        outcome.rejected.push(Rejection { claim_key: claim_key(&key), claim, reason });
      }
    }
  }
  outcome
}

fn group_candidates(candidates: &[CandidateFact]) -> Vec<(String, Vec<&CandidateFact>)> {
  let mut order: Vec<(String, Vec<&CandidateFact>)> = Vec::new();
  let mut index: HashMap<String, usize> = HashMap::new();
  for candidate in candidates {
    let key = candidate.grouping_key();
    match index.get(&key) {
      Some(&idx) => order[idx].1.push(candidate),
      None => {
        index.insert(key.clone(), order.len());
        order.push((key, vec![candidate]));
      }
    }
  }
  order
}

fn corroborate_group(
  key: &str,
  group: &[&CandidateFact],
  registry: &SourceRegistry,
  config: &PipelineConfig,
  now: DateTime<Utc>,
) -> Result<StoryProposal, RejectReason> {
  let members = members(group, registry);
  let owner_groups = members
    .iter()
    .map(|m| m.source.owner_group.as_str())
    .collect::<HashSet<_>>()
    .len();

  let (lead, second) = best_pair(&members, registry)
    .ok_or(RejectReason::Uncorroborated { owner_groups })?;

  let fact_text = lead.candidate.cleaned_text.clone();
  if let Some(term) = find_phrase(&fact_text, &config.denylist) {
    let err = ValidationError::DisallowedTerm(term.to_owned());
    return Err(RejectReason::Invalid { detail: err.to_string() });
  }

  let location_tag = [lead, second]
    .into_iter()
    .chain(members.iter())
    .find_map(|m| m.candidate.location_tag.clone())
    .or_else(|| derive_location_tag(&fact_text, &config.regions));

  Ok(StoryProposal {
    sources: story_sources(lead, second, &members, registry),
    fact_text,
    location_tag,
    claim_key: claim_key(key),
    proposed_at: now,
  })
}

/// One member per source (its earliest report), sorted by observation time.
fn members<'a>(group: &[&'a CandidateFact], registry: &'a SourceRegistry) -> Vec<Member<'a>> {
  let mut seen = HashSet::new();
  let mut members: Vec<Member<'a>> = group
    .iter()
    .filter_map(|&candidate| {
      let source = registry.get(&candidate.source_name)?;
      Some(Member { candidate, source })
    })
    .collect();
  members.sort_by_key(|m| m.candidate.observed_at);
  members.retain(|m| seen.insert(m.source.name.as_str()));
  members
}

/// The independent pair with the greatest combined trust, higher-trust
/// member first. Earlier-observed pairs win ties.
fn best_pair<'m, 'a>(
  members: &'m [Member<'a>],
  registry: &SourceRegistry,
) -> Option<(&'m Member<'a>, &'m Member<'a>)> {
  let mut best: Option<(f32, &Member<'a>, &Member<'a>)> = None;
  for (i, a) in members.iter().enumerate() {
    for b in &members[i + 1..] {
      if !registry.are_independent(&a.source.name, &b.source.name) {
        continue;
      }
      let combined = a.source.trust_score + b.source.trust_score;
      if best.is_none_or(|(score, _, _)| combined > score) {
        best = Some((combined, a, b));
      }
    }
  }
  best.map(|(_, a, b)| {
    if b.source.trust_score > a.source.trust_score { (b, a) } else { (a, b) }
  })
}

/// The elected pair first, then the most trusted remaining source of each
/// other owner group, provided it is independent of everything chosen so far.
fn story_sources(
  lead: &Member<'_>,
  second: &Member<'_>,
  members: &[Member<'_>],
  registry: &SourceRegistry,
) -> Vec<StorySource> {
  let mut rest: Vec<&Member<'_>> = members
    .iter()
    .filter(|m| m.source.name != lead.source.name && m.source.name != second.source.name)
    .collect();
  rest.sort_by(|a, b| b.source.trust_score.total_cmp(&a.source.trust_score));

  let mut chosen: Vec<&Source> = vec![lead.source, second.source];
  for m in rest {
    if chosen
      .iter()
      .all(|c| registry.are_independent(&c.name, &m.source.name))
    {
      chosen.push(m.source);
    }
  }

  chosen
    .into_iter()
    .map(|s| StorySource {
      source_name: s.name.clone(),
      owner_group: s.owner_group.clone(),
      trust_score: s.trust_score,
    })
    .collect()
}
