//! On-disk document shapes and the write-to-temp-then-rename helper.
//!
//! `stories.json` is an object with a single `stories` array; consumers rely
//! on that shape. `corrections.json` is a bare array of records. Each
//! `processed_YYYY-MM-DD.json` maps headline fingerprints to the extraction
//! oracle's answer.

use std::{
  collections::{BTreeMap, HashSet},
  path::{Path, PathBuf},
};

use chrono::NaiveDate;
use plainwire_core::{correction::CorrectionRecord, oracle::Extraction, story::Story};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt as _;

use crate::{Error, Result};

pub const STORIES_FILE: &str = "stories.json";
pub const CORRECTIONS_FILE: &str = "corrections.json";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LedgerDocument {
  pub stories: Vec<Story>,
}

/// Borrowed twin of [`LedgerDocument`] so writes don't clone the ledger.
#[derive(Serialize)]
struct LedgerDocumentRef<'a> {
  stories: &'a [Story],
}

/// Where a ledger's files live.
#[derive(Debug, Clone)]
pub struct LedgerPaths {
  pub dir:         PathBuf,
  pub stories:     PathBuf,
  pub corrections: PathBuf,
}

impl LedgerPaths {
  pub fn in_dir(dir: &Path) -> Self {
    Self {
      dir:         dir.to_owned(),
      stories:     dir.join(STORIES_FILE),
      corrections: dir.join(CORRECTIONS_FILE),
    }
  }

  /// The headline cache for one day.
  pub fn processed(&self, day: NaiveDate) -> PathBuf {
    self.dir.join(format!("processed_{}.json", day.format("%Y-%m-%d")))
  }
}

// ─── Reading ─────────────────────────────────────────────────────────────────

/// Read and parse `path`, or return `None` if it doesn't exist yet.
async fn read_optional<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>> {
  match tokio::fs::read(path).await {
    Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
    Err(source) => Err(Error::Io { path: path.to_owned(), source }),
  }
}

pub async fn load_stories(path: &Path) -> Result<Vec<Story>> {
  let doc: LedgerDocument = read_optional(path).await?.unwrap_or_default();
  check_story_order(&doc.stories)?;
  Ok(doc.stories)
}

pub async fn load_corrections(path: &Path) -> Result<Vec<CorrectionRecord>> {
  let records: Vec<CorrectionRecord> = read_optional(path).await?.unwrap_or_default();
  let mut seen = HashSet::with_capacity(records.len());
  for record in &records {
    if !seen.insert(record.record_id) {
      return Err(Error::Corrupt(format!(
        "correction record {} appears twice",
        record.record_id
      )));
    }
  }
  Ok(records)
}

pub async fn load_processed(path: &Path) -> Result<BTreeMap<String, Extraction>> {
  Ok(read_optional(path).await?.unwrap_or_default())
}

/// Ids must be unique, and within a date they must appear in sequence order
/// starting at 1 with no gaps.
fn check_story_order(stories: &[Story]) -> Result<()> {
  let mut last_seq = std::collections::HashMap::new();
  for story in stories {
    let expected = last_seq.get(&story.id.date).copied().unwrap_or(0) + 1;
    if story.id.seq != expected {
      return Err(Error::Corrupt(format!(
        "story {} found where sequence {expected} was expected",
        story.id
      )));
    }
    last_seq.insert(story.id.date, story.id.seq);
  }
  Ok(())
}

// ─── Writing ─────────────────────────────────────────────────────────────────

pub async fn write_stories(path: &Path, stories: &[Story]) -> Result<()> {
  let bytes = serde_json::to_vec_pretty(&LedgerDocumentRef { stories })?;
  write_atomic(path, &bytes).await
}

pub async fn write_corrections(path: &Path, records: &[CorrectionRecord]) -> Result<()> {
  let bytes = serde_json::to_vec_pretty(records)?;
  write_atomic(path, &bytes).await
}

pub async fn write_processed(path: &Path, answers: &BTreeMap<String, Extraction>) -> Result<()> {
  let bytes = serde_json::to_vec_pretty(answers)?;
  write_atomic(path, &bytes).await
}

/// Write `bytes` to a sibling temp file, fsync it, then rename it over
/// `path`.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
  let io_err = |source| Error::Io { path: path.to_owned(), source };

  let mut tmp = path.as_os_str().to_owned();
  tmp.push(".tmp");
  let tmp = PathBuf::from(tmp);

  let mut file = tokio::fs::File::create(&tmp).await.map_err(io_err)?;
  file.write_all(bytes).await.map_err(io_err)?;
  file.sync_all().await.map_err(io_err)?;
  drop(file);

  tokio::fs::rename(&tmp, path).await.map_err(io_err)
}
