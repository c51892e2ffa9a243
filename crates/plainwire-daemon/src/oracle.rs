//! HTTP client for the extraction and contradiction oracles.
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | `POST` | `/extract` | `{"headline": …, "source": …}` | [`Extraction`] |
//! | `POST` | `/contradiction` | [`ContradictionQuery`] | [`ContradictionVerdict`] |

use std::time::Duration;

use plainwire_core::{
  candidate::Headline,
  oracle::{
    ContradictionChecker, ContradictionQuery, ContradictionVerdict, Extraction, FactExtractor,
  },
  source::Source,
};
use reqwest::Client;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::config::OracleConfig;

#[derive(Debug, Error)]
pub enum OracleError {
  #[error("oracle request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("oracle {endpoint} returned {status}: {body}")]
  Status {
    endpoint: &'static str,
    status:   u16,
    body:     String,
  },
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
  headline: &'a Headline,
  source:   &'a Source,
}

/// Both oracles behind one base URL.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpOracle {
  client:   Client,
  base_url: String,
  api_key:  Option<String>,
}

impl HttpOracle {
  pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self {
      client,
      base_url: config.base_url.trim_end_matches('/').to_owned(),
      api_key: config.api_key.clone(),
    })
  }

  async fn post<B, T>(&self, endpoint: &'static str, body: &B) -> Result<T, OracleError>
  where
    B: Serialize + Sync + ?Sized,
    T: DeserializeOwned,
  {
    let mut req = self.client.post(format!("{}{endpoint}", self.base_url)).json(body);
    if let Some(key) = &self.api_key {
      req = req.bearer_auth(key);
    }

    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(OracleError::Status { endpoint, status: status.as_u16(), body });
    }
    Ok(resp.json().await?)
  }
}

impl FactExtractor for HttpOracle {
  type Error = OracleError;

  async fn extract(&self, headline: &Headline, source: &Source) -> Result<Extraction, OracleError> {
    self.post("/extract", &ExtractRequest { headline, source }).await
  }
}

impl ContradictionChecker for HttpOracle {
  type Error = OracleError;

  async fn check(&self, query: &ContradictionQuery) -> Result<ContradictionVerdict, OracleError> {
    self.post("/contradiction", query).await
  }
}
