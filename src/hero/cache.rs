//! Identity of the logical hero list held in the cache.

use sha2::{Digest, Sha256};

/// Which list the cache currently mirrors: every hero, or a search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListKey {
  query: Option<String>,
}

impl ListKey {
  /// Build a key for a search term. Blank terms mean the full catalog.
  pub fn for_query(query: Option<&str>) -> Self {
    let query = query.map(normalize_query).filter(|q| !q.is_empty());
    Self { query }
  }

  pub fn all() -> Self {
    Self { query: None }
  }

  /// Normalized search term sent to the remote source, if any.
  pub fn query(&self) -> Option<&str> {
    self.query.as_deref()
  }

  /// Stable, fixed-length hash identifying this list in storage.
  pub fn cache_hash(&self) -> String {
    let input = match &self.query {
      Some(q) => format!("hero_search:{}", q),
      None => "heroes:all".to_string(),
    };

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  pub fn description(&self) -> String {
    match &self.query {
      Some(q) => format!("heroes matching {:?}", q),
      None => "all heroes".to_string(),
    }
  }
}

/// Trims whitespace and lowercases for case-insensitive matching.
fn normalize_query(query: &str) -> String {
  query.trim().to_lowercase()
}
