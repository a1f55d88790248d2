//! Core traits and types for the paged cache.

use futures::future::BoxFuture;

use crate::error::FetchError;
use crate::hero::types::Hero;

/// Number of the first remote page.
pub const FIRST_PAGE: u32 = 1;

/// One page returned by the remote source, in the source's own order
/// (rating descending, id ascending).
#[derive(Debug, Clone, Default)]
pub struct RemotePage {
  pub heroes: Vec<Hero>,
  /// The source marked this page as the final one
  pub is_last: bool,
}

/// A paged remote source of heroes.
///
/// `query` is a normalized search term, or `None` for the full catalog.
pub trait RemoteSource: Send + Sync {
  fn fetch_page<'a>(
    &'a self,
    query: Option<&'a str>,
    page: u32,
  ) -> BoxFuture<'a, Result<RemotePage, FetchError>>;
}

/// What the consumer is asking the mediator to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
  /// First page of the list; clears only when the list is new
  Initial,
  /// First page of the list, always discarding what is cached
  Refresh,
  /// The page after the one holding `last_hero_id`
  Append { last_hero_id: Option<i64> },
  /// The page before the one holding `first_hero_id`
  Prepend { first_hero_id: Option<i64> },
}

/// Result of a load request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
  /// A page was fetched and committed
  Loaded {
    page: u32,
    count: usize,
    /// No further page follows this one
    end_of_data: bool,
  },
  /// The boundary was already known; no fetch was issued
  EndOfData,
  /// No cursor to continue from; the caller should issue an initial load
  Skipped,
  /// The fetch failed and nothing was written
  Failed(FetchError),
}

impl LoadOutcome {
  pub fn is_end_of_data(&self) -> bool {
    matches!(
      self,
      LoadOutcome::EndOfData
        | LoadOutcome::Loaded {
          end_of_data: true,
          ..
        }
    )
  }

  pub fn error(&self) -> Option<&FetchError> {
    match self {
      LoadOutcome::Failed(e) => Some(e),
      _ => None,
    }
  }
}

/// Whether a consumer opening the list should trigger an initial load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializeAction {
  /// Cached list is current; serve it as is
  SkipInitialRefresh,
  /// Cached list is missing, stale, or for another query
  LaunchInitialRefresh,
}
