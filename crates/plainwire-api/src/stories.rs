//! Handlers for `/stories` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/stories` | optional `status`, `location_tag`, `since`, `until`, `limit` |
//! | `GET`  | `/stories/:id` | `id` may carry delimiters, e.g. `[2026-03-01-001]` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use plainwire_core::{
  ledger::{StoryFilter, StoryLedger},
  story::{StatusKind, Story, StoryId, normalize_story_id},
};
use serde::Deserialize;

use crate::error::ApiError;

/// Upper bound on stories returned by one list call.
pub const MAX_LIMIT: usize = 500;

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub status:       Option<StatusKind>,
  pub location_tag: Option<String>,
  /// Only stories published at or after this instant.
  pub since:        Option<DateTime<Utc>>,
  /// Only stories published before this instant.
  pub until:        Option<DateTime<Utc>>,
  pub limit:        Option<usize>,
}

impl From<ListParams> for StoryFilter {
  fn from(p: ListParams) -> Self {
    StoryFilter {
      status:           p.status,
      published_after:  p.since,
      published_before: p.until,
      location_tag:     p.location_tag,
      claim_key:        None,
      limit:            Some(p.limit.unwrap_or(MAX_LIMIT).min(MAX_LIMIT)),
    }
  }
}

/// `GET /stories`: stories in ledger (publication) order.
pub async fn list<L>(
  State(ledger): State<Arc<L>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Story>>, ApiError>
where
  L: StoryLedger,
{
  let stories = ledger
    .list(&StoryFilter::from(params))
    .await
    .map_err(ApiError::ledger)?;
  Ok(Json(stories))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /stories/:id`
pub async fn get_one<L>(
  State(ledger): State<Arc<L>>,
  Path(id): Path<String>,
) -> Result<Json<Story>, ApiError>
where
  L: StoryLedger,
{
  let id = parse_id(&id)?;
  let story = ledger
    .get(&id.to_string())
    .await
    .map_err(ApiError::ledger)?
    .ok_or_else(|| ApiError::NotFound(format!("story {id} not found")))?;
  Ok(Json(story))
}

pub(crate) fn parse_id(raw: &str) -> Result<StoryId, ApiError> {
  normalize_story_id(raw)
    .parse()
    .map_err(|_| ApiError::BadRequest(format!("{raw:?} is not a story id")))
}
