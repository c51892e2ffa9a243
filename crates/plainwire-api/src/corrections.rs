//! Handlers for the correction log.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/corrections` | optional `story_id`, `kind`, `pending` |
//! | `GET`  | `/stories/:id/corrections` | every record targeting one story |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use plainwire_core::{
  correction::{CorrectionFilter, CorrectionKind, CorrectionRecord},
  ledger::StoryLedger,
};
use serde::Deserialize;

use crate::{error::ApiError, stories::parse_id};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub story_id: Option<String>,
  pub kind:     Option<CorrectionKind>,
  /// `true` for records still awaiting application, `false` for applied ones.
  pub pending:  Option<bool>,
}

/// `GET /corrections`
pub async fn list<L>(
  State(ledger): State<Arc<L>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<CorrectionRecord>>, ApiError>
where
  L: StoryLedger,
{
  let filter = CorrectionFilter {
    target_story_id: params.story_id,
    kind:            params.kind,
    applied:         params.pending.map(|pending| !pending),
    detected_before: None,
    detected_after:  None,
  };
  let records = ledger.corrections(&filter).await.map_err(ApiError::ledger)?;
  Ok(Json(records))
}

/// `GET /stories/:id/corrections`, 404 if the story does not exist.
pub async fn for_story<L>(
  State(ledger): State<Arc<L>>,
  Path(id): Path<String>,
) -> Result<Json<Vec<CorrectionRecord>>, ApiError>
where
  L: StoryLedger,
{
  let id = parse_id(&id)?.to_string();
  if ledger.get(&id).await.map_err(ApiError::ledger)?.is_none() {
    return Err(ApiError::NotFound(format!("story {id} not found")));
  }
  let filter = CorrectionFilter { target_story_id: Some(id), ..CorrectionFilter::default() };
  let records = ledger.corrections(&filter).await.map_err(ApiError::ledger)?;
  Ok(Json(records))
}
