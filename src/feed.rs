//! Consumer-side paging over the hero cache.
//!
//! A `Feed` tracks what the consumer has already seen and asks for more
//! explicitly: cached heroes are read first, and only when the cache runs
//! dry does it ask the mediator to append the next remote page.
//!
//! # Example
//!
//! ```ignore
//! let mut feed = Feed::new(mediator.clone(), ListKey::all(), 3);
//! feed.start().await?;
//!
//! while feed.state().can_load_more() {
//!     feed.load_more().await?;
//! }
//!
//! match feed.state() {
//!     FeedState::EndOfData => render_list(feed.heroes()),
//!     FeedState::Error(e) => render_error(e),
//!     _ => {}
//! }
//! ```

use std::sync::Arc;

use crate::cache::{InitializeAction, LoadKind, LoadOutcome, PagedCacheMediator, RemoteSource};
use crate::error::StoreResult;
use crate::hero::cache::ListKey;
use crate::hero::types::Hero;

/// The state of a feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedState {
  /// Not started, or the list needs an initial load
  Idle,
  /// A load is running
  Loading,
  /// More heroes may follow
  Ready,
  /// Everything in the list has been shown
  EndOfData,
  /// The last load failed; heroes already shown stay visible
  Error(String),
}

impl FeedState {
  pub fn can_load_more(&self) -> bool {
    matches!(self, FeedState::Ready)
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      FeedState::Error(e) => Some(e),
      _ => None,
    }
  }
}

pub struct Feed<R: RemoteSource> {
  mediator: Arc<PagedCacheMediator<R>>,
  list: ListKey,
  page_size: usize,
  heroes: Vec<Hero>,
  state: FeedState,
}

impl<R: RemoteSource> Feed<R> {
  pub fn new(mediator: Arc<PagedCacheMediator<R>>, list: ListKey, page_size: usize) -> Self {
    Self {
      mediator,
      list,
      page_size: page_size.max(1),
      heroes: Vec::new(),
      state: FeedState::Idle,
    }
  }

  pub fn heroes(&self) -> &[Hero] {
    &self.heroes
  }

  pub fn state(&self) -> &FeedState {
    &self.state
  }

  pub fn list(&self) -> &ListKey {
    &self.list
  }

  /// Open the list: refresh the first page if the cache is not current,
  /// then show the first cached page.
  pub async fn start(&mut self) -> StoreResult<()> {
    self.heroes.clear();
    self.state = FeedState::Loading;

    let mut failure = None;
    if self.mediator.initialize(&self.list)? == InitializeAction::LaunchInitialRefresh {
      if let LoadOutcome::Failed(e) = self.mediator.load(&self.list, LoadKind::Initial).await? {
        failure = Some(e.to_string());
      }
    }

    // Whatever survived a failed refresh is still worth showing, as long
    // as it belongs to this list.
    if failure.is_none() || self.mediator.is_cached(&self.list)? {
      self.read_cached()?;
    }

    self.state = match failure {
      Some(e) => FeedState::Error(e),
      None if self.heroes.is_empty() => FeedState::EndOfData,
      None => FeedState::Ready,
    };
    Ok(())
  }

  /// Show the next page, fetching it from the remote source when the cache
  /// has nothing beyond the last visible hero.
  pub async fn load_more(&mut self) -> StoreResult<()> {
    if matches!(self.state, FeedState::EndOfData | FeedState::Loading) {
      return Ok(());
    }

    // The store may hold another list, either because opening this one
    // failed or because a different query replaced it since.
    if !self.mediator.is_cached(&self.list)? {
      if self.heroes.is_empty() {
        return self.start().await;
      }
      self.state = FeedState::Idle;
      return Ok(());
    }
    self.state = FeedState::Loading;

    if self.read_cached()? > 0 {
      self.state = FeedState::Ready;
      return Ok(());
    }

    let last_hero_id = self.heroes.last().map(|h| h.id);
    let outcome = self
      .mediator
      .load(&self.list, LoadKind::Append { last_hero_id })
      .await?;

    self.state = match outcome {
      LoadOutcome::Loaded { .. } => {
        if self.read_cached()? > 0 {
          FeedState::Ready
        } else {
          FeedState::EndOfData
        }
      }
      LoadOutcome::EndOfData => FeedState::EndOfData,
      LoadOutcome::Skipped => FeedState::Idle,
      LoadOutcome::Failed(e) => FeedState::Error(e.to_string()),
    };
    Ok(())
  }

  /// Append the next cached page after the last visible hero.
  fn read_cached(&mut self) -> StoreResult<usize> {
    let after = self.heroes.last().map(|h| h.id);
    let page = self.mediator.store().page_after(after, self.page_size)?;
    let count = page.len();
    self.heroes.extend(page);
    Ok(count)
  }
}

impl<R: RemoteSource> std::fmt::Debug for Feed<R> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Feed")
      .field("list", &self.list)
      .field("state", &self.state)
      .field("shown", &self.heroes.len())
      .finish_non_exhaustive()
  }
}
