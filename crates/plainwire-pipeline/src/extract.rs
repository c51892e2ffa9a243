//! Headline acquisition and the candidate extractor adapter.
//!
//! Both steps fan out concurrently and both treat every failure as "nothing
//! from there this cycle". A slow or broken feed or oracle never fails a
//! cycle. The oracle's answers are cached per day by headline fingerprint;
//! a headline seen again that day reuses its answer instead of a new call.

use std::collections::BTreeMap;

use futures::{StreamExt as _, stream};
use plainwire_core::{
  Error,
  candidate::{CandidateFact, Headline},
  oracle::{ExtractedFact, Extraction, FactExtractor, HeadlineFeed},
  source::SourceRegistry,
};
use serde::Serialize;
use tokio::time::timeout;

use crate::PipelineConfig;

// ─── Acquisition ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Acquired {
  pub headlines:      Vec<Headline>,
  /// Names of sources whose fetch failed or timed out.
  pub failed_sources: Vec<String>,
}

/// Fetch current headlines from every registered source.
///
/// Headlines come back in registry order. Headlines a feed attributes to a
/// different source than the one asked for are dropped.
pub async fn acquire<F: HeadlineFeed>(
  feed: &F,
  registry: &SourceRegistry,
  config: &PipelineConfig,
) -> Acquired {
  let limit = config.fetch_timeout();
  let results: Vec<_> = stream::iter(registry.iter())
    .map(|source| async move { (source, timeout(limit, feed.fetch(source)).await) })
    .buffered(config.fetch_concurrency.max(1))
    .collect()
    .await;

  let mut acquired = Acquired::default();
  for (source, result) in results {
    let reason = match result {
      Ok(Ok(headlines)) => {
        let before = headlines.len();
        acquired
          .headlines
          .extend(headlines.into_iter().filter(|h| h.source_name == source.name));
        tracing::debug!(source = %source.name, count = before, "fetched headlines");
        continue;
      }
      Ok(Err(e)) => e.to_string(),
      Err(_) => format!("timed out after {limit:?}"),
    };
    let err = Error::SourceFetch { source_name: source.name.clone(), reason };
    tracing::warn!(%err, "no headlines from source this cycle");
    acquired.failed_sources.push(source.name.clone());
  }
  acquired
}

// ─── Extraction ──────────────────────────────────────────────────────────────

/// Counters for the extraction step. Cached answers count toward the
/// same buckets as fresh ones.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
  pub no_fact:        usize,
  pub low_confidence: usize,
  pub not_newsworthy: usize,
  pub unknown_source: usize,
  pub failures:       usize,
}

#[derive(Debug, Default)]
pub struct Extracted {
  /// Every usable candidate, cached or fresh, in headline order.
  pub candidates: Vec<CandidateFact>,
  /// The subset of `candidates` extracted by this call.
  pub fresh:      Vec<CandidateFact>,
  pub stats:      ExtractStats,
  /// New oracle answers by headline fingerprint. Failed and timed-out calls
  /// are left out so they are retried.
  pub answers:    BTreeMap<String, Extraction>,
  /// Headlines answered from `cache` without calling the oracle.
  pub reused:     usize,
}

enum Lookup<R> {
  Cached(Extraction),
  Asked(R),
}

/// Run every headline through the extraction oracle and keep the usable
/// results as candidate facts. Headlines whose fingerprint is in `cache`
/// take the cached answer.
pub async fn extract_candidates<X: FactExtractor>(
  extractor: &X,
  registry: &SourceRegistry,
  headlines: &[Headline],
  cache: &BTreeMap<String, Extraction>,
  config: &PipelineConfig,
) -> Extracted {
  let mut out = Extracted::default();

  let known: Vec<_> = headlines
    .iter()
    .filter_map(|h| match registry.get(&h.source_name) {
      Some(source) => Some((h, source)),
      None => {
        tracing::debug!(source = %h.source_name, "headline from unregistered source");
        out.stats.unknown_source += 1;
        None
      }
    })
    .collect();

  let limit = config.oracle_timeout();
  let results: Vec<_> = stream::iter(known)
    .map(|(headline, source)| async move {
      let fingerprint = headline.fingerprint();
      let lookup = match cache.get(&fingerprint) {
        Some(answer) => Lookup::Cached(answer.clone()),
        None => Lookup::Asked(timeout(limit, extractor.extract(headline, source)).await),
      };
      (headline, fingerprint, lookup)
    })
    .buffered(config.extraction_concurrency.max(1))
    .collect()
    .await;

  for (headline, fingerprint, lookup) in results {
    let (answer, fresh) = match lookup {
      Lookup::Cached(answer) => {
        out.reused += 1;
        (answer, false)
      }
      Lookup::Asked(Ok(Ok(answer))) => {
        out.answers.insert(fingerprint, answer.clone());
        (answer, true)
      }
      Lookup::Asked(Ok(Err(e))) => {
        let err = Error::Oracle(e.to_string());
        tracing::warn!(%err, source = %headline.source_name, "extraction failed");
        out.stats.failures += 1;
        continue;
      }
      Lookup::Asked(Err(_)) => {
        let err = Error::Oracle(format!("extraction timed out after {limit:?}"));
        tracing::warn!(%err, source = %headline.source_name, "extraction failed");
        out.stats.failures += 1;
        continue;
      }
    };

    let fact = match answer {
      Extraction::Fact(fact) => fact,
      Extraction::NoFact => {
        out.stats.no_fact += 1;
        continue;
      }
    };
    let Some(fact) = screen(fact, config, fresh, &mut out.stats) else {
      continue;
    };

    let candidate = CandidateFact {
      raw_text:        headline.text.clone(),
      extracted_claim: fact.extracted_claim,
      cleaned_text:    fact.cleaned_text.trim().to_owned(),
      source_name:     headline.source_name.clone(),
      observed_at:     headline.observed_at,
      location_tag:    fact.location_tag.filter(|t| !t.trim().is_empty()),
      cluster_key:     fact.cluster_key,
    };
    if fresh {
      out.fresh.push(candidate.clone());
    }
    out.candidates.push(candidate);
  }

  out
}

/// Reject facts with no usable text, too little confidence, or no news
/// value, counting each drop. A missing confidence or newsworthiness
/// judgement passes. Drops are logged only the first time a headline is seen.
fn screen(
  fact: ExtractedFact,
  config: &PipelineConfig,
  fresh: bool,
  stats: &mut ExtractStats,
) -> Option<ExtractedFact> {
  if fact.extracted_claim.trim().is_empty() || fact.cleaned_text.trim().is_empty() {
    stats.no_fact += 1;
    return None;
  }
  if let Some(confidence) = fact.confidence
    && confidence < config.min_confidence
  {
    if fresh {
      tracing::info!(confidence, claim = %fact.extracted_claim, "low confidence, dropped");
    }
    stats.low_confidence += 1;
    return None;
  }
  if fact.newsworthy == Some(false) {
    if fresh {
      tracing::info!(claim = %fact.extracted_claim, "not newsworthy, dropped");
    }
    stats.not_newsworthy += 1;
    return None;
  }
  Some(fact)
}
