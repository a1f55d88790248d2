//! Typed errors for the fetch and storage layers.
//!
//! The application boundary (config, CLI) reports through `color_eyre`; these
//! enums exist so the mediator can tell a failed fetch apart from a missing
//! row or a broken database.

use thiserror::Error;

/// Failure while fetching a page from the remote source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
  /// Connectivity problem or timeout
  #[error("network error: {0}")]
  Network(String),
  /// Non-success status, `success: false`, or an undecodable payload
  #[error("bad response: {0}")]
  Response(String),
}

impl From<reqwest::Error> for FetchError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() || e.is_connect() {
      FetchError::Network(e.to_string())
    } else if e.is_status() || e.is_decode() || e.is_body() {
      FetchError::Response(e.to_string())
    } else {
      FetchError::Network(e.to_string())
    }
  }
}

/// Failure reading from or writing to the local store.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("hero {0} is not cached")]
  NotFound(i64),
  #[error("sqlite: {0}")]
  Sqlite(#[from] rusqlite::Error),
  #[error("failed to encode cached column: {0}")]
  Codec(#[from] serde_json::Error),
  #[error("storage lock poisoned")]
  Poisoned,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
