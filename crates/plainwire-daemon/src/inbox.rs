//! [`InboxFeed`]: headlines handed over by the external scraper as one JSON
//! file per source.
//!
//! The scraper writes `<inbox>/<source id>.json` containing an array of
//! `{"text": "...", "observed_at": "..."}` objects; `observed_at` may be
//! omitted, in which case the read time is used. A missing file means the
//! source had nothing new.

use std::{io::ErrorKind, path::PathBuf};

use chrono::{DateTime, Utc};
use plainwire_core::{candidate::Headline, oracle::HeadlineFeed, source::Source};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InboxError {
  #[error("i/o error on {path}: {source}")]
  Io {
    path:   PathBuf,
    source: std::io::Error,
  },

  #[error("malformed inbox file {path}: {source}")]
  Json {
    path:   PathBuf,
    source: serde_json::Error,
  },
}

#[derive(Deserialize)]
struct InboxItem {
  text:        String,
  #[serde(default)]
  observed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct InboxFeed {
  dir: PathBuf,
}

impl InboxFeed {
  pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

  fn path_for(&self, source: &Source) -> PathBuf { self.dir.join(format!("{}.json", source.id)) }
}

impl HeadlineFeed for InboxFeed {
  type Error = InboxError;

  async fn fetch(&self, source: &Source) -> Result<Vec<Headline>, InboxError> {
    let path = self.path_for(source);
    let bytes = match tokio::fs::read(&path).await {
      Ok(bytes) => bytes,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(InboxError::Io { path, source: e }),
    };
    let items: Vec<InboxItem> = match serde_json::from_slice(&bytes) {
      Ok(items) => items,
      Err(e) => return Err(InboxError::Json { path, source: e }),
    };

    let now = Utc::now();
    Ok(
      items
        .into_iter()
        .filter(|item| !item.text.trim().is_empty())
        .map(|item| Headline {
          source_name: source.name.clone(),
          text:        item.text.trim().to_owned(),
          observed_at: item.observed_at.unwrap_or(now),
        })
        .collect(),
    )
  }
}
