//! Read-only JSON API over a story ledger.
//!
//! Exposes an axum [`Router`] backed by any
//! [`plainwire_core::ledger::StoryLedger`]. Nothing here writes to the
//! ledger; stories and corrections only enter it through the pipeline.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", plainwire_api::api_router(ledger.clone()))
//! ```

pub mod corrections;
pub mod error;
pub mod stories;

use std::sync::Arc;

use axum::{Router, routing::get};
use plainwire_core::ledger::StoryLedger;

pub use error::ApiError;

/// Build the API router for `ledger`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<L>(ledger: Arc<L>) -> Router<()>
where
  L: StoryLedger + 'static,
{
  Router::new()
    .route("/stories", get(stories::list::<L>))
    .route("/stories/{id}", get(stories::get_one::<L>))
    .route("/stories/{id}/corrections", get(corrections::for_story::<L>))
    .route("/corrections", get(corrections::list::<L>))
    .with_state(ledger)
}
