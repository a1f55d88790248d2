//! Mediator that decides between cache and network and keeps the local
//! store's heroes and page keys consistent.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::storage::{ListState, LocalStore, PageWrite};
use super::traits::{InitializeAction, LoadKind, LoadOutcome, RemotePage, RemoteSource, FIRST_PAGE};
use crate::error::StoreResult;
use crate::hero::cache::ListKey;
use crate::hero::types::PageKey;

/// Paged cache mediator.
///
/// The mediator is the only writer of the local store. Loads are serialized:
/// at most one fetch and one write transaction run at a time, since
/// overlapping writes would break the previous/next key chain. Reads go
/// straight to the [`LocalStore`] and never wait on the network.
pub struct PagedCacheMediator<R: RemoteSource> {
  remote: R,
  store: Arc<LocalStore>,
  /// How long a refreshed list is served without refetching page one
  cache_timeout: chrono::Duration,
  load_lock: Mutex<()>,
}

impl<R: RemoteSource> PagedCacheMediator<R> {
  pub fn new(remote: R, store: Arc<LocalStore>, cache_timeout: chrono::Duration) -> Self {
    Self {
      remote,
      store,
      cache_timeout,
      load_lock: Mutex::new(()),
    }
  }

  pub fn store(&self) -> &Arc<LocalStore> {
    &self.store
  }

  #[cfg(test)]
  pub(crate) fn remote(&self) -> &R {
    &self.remote
  }

  /// Decide whether opening `list` needs an initial load.
  pub fn initialize(&self, list: &ListKey) -> StoreResult<InitializeAction> {
    let Some(state) = self.store.list_state()? else {
      return Ok(InitializeAction::LaunchInitialRefresh);
    };

    let current = state.query_hash == list.cache_hash()
      && self.store.count()? > 0
      && Utc::now() - state.refreshed_at < self.cache_timeout;

    Ok(if current {
      InitializeAction::SkipInitialRefresh
    } else {
      InitializeAction::LaunchInitialRefresh
    })
  }

  /// Run one load request for `list`.
  ///
  /// Fetch failures are reported as [`LoadOutcome::Failed`] and leave the
  /// store untouched. Only storage failures are returned as errors.
  /// Dropping the returned future before the fetch completes commits nothing.
  pub async fn load(&self, list: &ListKey, kind: LoadKind) -> StoreResult<LoadOutcome> {
    let _guard = self.load_lock.lock().await;

    let (page, clear, starts_list) = match kind {
      LoadKind::Initial => (FIRST_PAGE, self.is_new_list(list)?, true),
      LoadKind::Refresh => (FIRST_PAGE, true, true),
      LoadKind::Append { last_hero_id } => {
        if !self.is_cached(list)? {
          tracing::debug!(list = %list.description(), "append before initial load");
          return Ok(LoadOutcome::Skipped);
        }
        let Some(last_hero_id) = last_hero_id else {
          return Ok(LoadOutcome::Skipped);
        };
        match self.store.page_key(last_hero_id)? {
          None => return Ok(LoadOutcome::Skipped),
          Some(PageKey {
            next_page: None, ..
          }) => return Ok(LoadOutcome::EndOfData),
          Some(PageKey {
            next_page: Some(next),
            ..
          }) => (next, false, false),
        }
      }
      // The feed only grows forward.
      LoadKind::Prepend { .. } => return Ok(LoadOutcome::EndOfData),
    };

    tracing::debug!(list = %list.description(), page, clear, "fetching page");
    let fetched = match self.remote.fetch_page(list.query(), page).await {
      Ok(fetched) => fetched,
      Err(e) => {
        tracing::warn!(list = %list.description(), page, error = %e, "page fetch failed");
        return Ok(LoadOutcome::Failed(e));
      }
    };

    let (prev_page, next_page) = page_cursors(page, &fetched);
    let keys: Vec<PageKey> = fetched
      .heroes
      .iter()
      .map(|hero| PageKey {
        hero_id: hero.id,
        prev_page,
        next_page,
      })
      .collect();
    let count = fetched.heroes.len();

    let list_state = starts_list.then(|| ListState {
      query_hash: list.cache_hash(),
      description: list.description(),
      refreshed_at: Utc::now(),
    });

    self.store.write_page(&PageWrite {
      clear,
      list: list_state,
      heroes: fetched.heroes,
      keys,
    })?;

    tracing::info!(
      list = %list.description(),
      page,
      count,
      end_of_data = next_page.is_none(),
      "page cached"
    );

    Ok(LoadOutcome::Loaded {
      page,
      count,
      end_of_data: next_page.is_none(),
    })
  }

  /// Whether the cache currently mirrors `list`.
  pub fn is_cached(&self, list: &ListKey) -> StoreResult<bool> {
    Ok(
      self
        .store
        .list_state()?
        .is_some_and(|state| state.query_hash == list.cache_hash()),
    )
  }

  /// A list is new when nothing is cached or the cache holds another query.
  fn is_new_list(&self, list: &ListKey) -> StoreResult<bool> {
    Ok(!self.is_cached(list)? || self.store.count()? == 0)
  }
}

/// Previous and next page numbers recorded for every hero of `page`.
fn page_cursors(page: u32, fetched: &RemotePage) -> (Option<u32>, Option<u32>) {
  let prev_page = if page > FIRST_PAGE {
    Some(page - 1)
  } else {
    None
  };
  let next_page = if fetched.heroes.is_empty() || fetched.is_last {
    None
  } else {
    page.checked_add(1)
  };
  (prev_page, next_page)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::testing::{catalog, ScriptedRemote};
  use crate::error::FetchError;
  use crate::hero::types::Hero;
  use std::sync::atomic::Ordering;
  use std::time::Duration;

  fn mediator(remote: ScriptedRemote) -> PagedCacheMediator<ScriptedRemote> {
    let store = Arc::new(LocalStore::open_in_memory().unwrap());
    PagedCacheMediator::new(remote, store, chrono::Duration::minutes(60))
  }

  fn ids(heroes: &[Hero]) -> Vec<i64> {
    heroes.iter().map(|h| h.id).collect()
  }

  #[test]
  fn test_page_cursors() {
    let full = RemotePage {
      heroes: catalog(1..3),
      is_last: false,
    };
    let last = RemotePage {
      heroes: catalog(1..3),
      is_last: true,
    };
    let empty = RemotePage::default();

    assert_eq!(page_cursors(1, &full), (None, Some(2)));
    assert_eq!(page_cursors(3, &full), (Some(2), Some(4)));
    assert_eq!(page_cursors(3, &last), (Some(2), None));
    assert_eq!(page_cursors(2, &empty), (Some(1), None));
  }

  #[tokio::test]
  async fn test_initial_load_into_empty_store() {
    let remote = ScriptedRemote::default();
    remote.page(None, 1, catalog(1..6), false);
    let mediator = mediator(remote);
    let all = ListKey::all();

    let outcome = mediator.load(&all, LoadKind::Initial).await.unwrap();
    assert_eq!(
      outcome,
      LoadOutcome::Loaded {
        page: 1,
        count: 5,
        end_of_data: false
      }
    );

    let store = mediator.store();
    assert_eq!(store.count().unwrap(), 5);
    for id in 1..6 {
      let key = store.page_key(id).unwrap().unwrap();
      assert_eq!(key.prev_page, None);
      assert_eq!(key.next_page, Some(2));
    }
  }

  #[tokio::test]
  async fn test_append_last_page() {
    let remote = ScriptedRemote::default();
    remote.page(None, 1, catalog(1..6), false);
    remote.page(None, 2, catalog(6..9), true);
    let mediator = mediator(remote);
    let all = ListKey::all();

    mediator.load(&all, LoadKind::Initial).await.unwrap();
    let outcome = mediator
      .load(
        &all,
        LoadKind::Append {
          last_hero_id: Some(5),
        },
      )
      .await
      .unwrap();

    assert_eq!(
      outcome,
      LoadOutcome::Loaded {
        page: 2,
        count: 3,
        end_of_data: true
      }
    );
    let store = mediator.store();
    assert_eq!(store.count().unwrap(), 8);
    for id in 6..9 {
      let key = store.page_key(id).unwrap().unwrap();
      assert_eq!(key.prev_page, Some(1));
      assert_eq!(key.next_page, None);
    }
  }

  #[tokio::test]
  async fn test_failed_append_keeps_cached_page() {
    let remote = ScriptedRemote::default();
    remote.page(None, 1, catalog(1..6), false);
    remote.set(
      None,
      2,
      Err(FetchError::Network("connection reset".to_string())),
    );
    let mediator = mediator(remote);
    let all = ListKey::all();

    mediator.load(&all, LoadKind::Initial).await.unwrap();
    let outcome = mediator
      .load(
        &all,
        LoadKind::Append {
          last_hero_id: Some(5),
        },
      )
      .await
      .unwrap();

    assert_eq!(
      outcome,
      LoadOutcome::Failed(FetchError::Network("connection reset".to_string()))
    );
    assert!(!outcome.is_end_of_data());
    assert_eq!(
      ids(&mediator.store().page_after(None, 100).unwrap()),
      vec![1, 2, 3, 4, 5]
    );
  }

  #[tokio::test]
  async fn test_query_change_clears_previous_results() {
    let remote = ScriptedRemote::default();
    remote.page(Some("a"), 1, catalog(1..4), true);
    remote.page(Some("b"), 1, catalog(10..12), true);
    let mediator = mediator(remote);

    let a = ListKey::for_query(Some("A"));
    let b = ListKey::for_query(Some("B"));

    mediator.load(&a, LoadKind::Initial).await.unwrap();
    assert_eq!(mediator.store().count().unwrap(), 3);

    mediator.load(&b, LoadKind::Initial).await.unwrap();
    let store = mediator.store();
    assert_eq!(ids(&store.page_after(None, 100).unwrap()), vec![10, 11]);
    assert_eq!(store.page_key(1).unwrap(), None);
    assert_eq!(
      store.list_state().unwrap().unwrap().query_hash,
      b.cache_hash()
    );
  }

  #[tokio::test]
  async fn test_end_of_data_skips_network() {
    let remote = ScriptedRemote::default();
    remote.page(None, 1, catalog(1..4), true);
    let mediator = mediator(remote);
    let all = ListKey::all();

    mediator.load(&all, LoadKind::Initial).await.unwrap();
    assert_eq!(mediator.remote.calls(), 1);

    let outcome = mediator
      .load(
        &all,
        LoadKind::Append {
          last_hero_id: Some(3),
        },
      )
      .await
      .unwrap();
    assert_eq!(outcome, LoadOutcome::EndOfData);
    assert_eq!(mediator.remote.calls(), 1);
  }

  #[tokio::test]
  async fn test_append_without_cursor_is_skipped() {
    let remote = ScriptedRemote::default();
    remote.page(None, 1, catalog(1..4), false);
    let mediator = mediator(remote);
    let all = ListKey::all();

    // Nothing cached yet
    let outcome = mediator
      .load(
        &all,
        LoadKind::Append {
          last_hero_id: Some(1),
        },
      )
      .await
      .unwrap();
    assert_eq!(outcome, LoadOutcome::Skipped);

    mediator.load(&all, LoadKind::Initial).await.unwrap();
    let outcome = mediator
      .load(&all, LoadKind::Append { last_hero_id: None })
      .await
      .unwrap();
    assert_eq!(outcome, LoadOutcome::Skipped);

    let outcome = mediator
      .load(
        &all,
        LoadKind::Append {
          last_hero_id: Some(99),
        },
      )
      .await
      .unwrap();
    assert_eq!(outcome, LoadOutcome::Skipped);
    assert_eq!(mediator.remote.calls(), 1);
  }

  #[tokio::test]
  async fn test_append_for_other_query_is_skipped() {
    let remote = ScriptedRemote::default();
    remote.page(None, 1, catalog(1..4), false);
    let mediator = mediator(remote);

    mediator.load(&ListKey::all(), LoadKind::Initial).await.unwrap();
    let outcome = mediator
      .load(
        &ListKey::for_query(Some("sa")),
        LoadKind::Append {
          last_hero_id: Some(3),
        },
      )
      .await
      .unwrap();
    assert_eq!(outcome, LoadOutcome::Skipped);
    assert_eq!(mediator.remote.calls(), 1);
  }

  #[tokio::test]
  async fn test_prepend_is_end_of_data() {
    let remote = ScriptedRemote::default();
    remote.page(None, 1, catalog(1..4), false);
    let mediator = mediator(remote);
    let all = ListKey::all();

    mediator.load(&all, LoadKind::Initial).await.unwrap();
    let outcome = mediator
      .load(
        &all,
        LoadKind::Prepend {
          first_hero_id: Some(1),
        },
      )
      .await
      .unwrap();
    assert_eq!(outcome, LoadOutcome::EndOfData);
    assert_eq!(mediator.remote.calls(), 1);
  }

  #[tokio::test]
  async fn test_initial_load_of_same_list_keeps_later_pages() {
    let remote = ScriptedRemote::default();
    remote.page(None, 1, catalog(1..4), false);
    remote.page(None, 2, catalog(4..6), true);
    let mediator = mediator(remote);
    let all = ListKey::all();

    mediator.load(&all, LoadKind::Initial).await.unwrap();
    mediator
      .load(
        &all,
        LoadKind::Append {
          last_hero_id: Some(3),
        },
      )
      .await
      .unwrap();
    mediator.load(&all, LoadKind::Initial).await.unwrap();

    assert_eq!(mediator.store().count().unwrap(), 5);
  }

  #[tokio::test]
  async fn test_refresh_always_clears() {
    let remote = ScriptedRemote::default();
    remote.page(None, 1, catalog(1..4), false);
    remote.page(None, 2, catalog(4..6), true);
    let mediator = mediator(remote);
    let all = ListKey::all();

    mediator.load(&all, LoadKind::Initial).await.unwrap();
    mediator
      .load(
        &all,
        LoadKind::Append {
          last_hero_id: Some(3),
        },
      )
      .await
      .unwrap();
    mediator.load(&all, LoadKind::Refresh).await.unwrap();

    assert_eq!(ids(&mediator.store().page_after(None, 100).unwrap()), vec![1, 2, 3]);
  }

  #[tokio::test]
  async fn test_failed_refresh_keeps_old_list() {
    let remote = ScriptedRemote::default();
    remote.page(None, 1, catalog(1..4), false);
    remote.set(
      Some("b"),
      1,
      Err(FetchError::Response("HTTP 500".to_string())),
    );
    let mediator = mediator(remote);

    mediator.load(&ListKey::all(), LoadKind::Initial).await.unwrap();
    let outcome = mediator
      .load(&ListKey::for_query(Some("b")), LoadKind::Initial)
      .await
      .unwrap();

    assert!(matches!(
      outcome,
      LoadOutcome::Failed(FetchError::Response(_))
    ));
    assert_eq!(mediator.store().count().unwrap(), 3);
    assert_eq!(
      mediator.store().list_state().unwrap().unwrap().query_hash,
      ListKey::all().cache_hash()
    );
  }

  #[tokio::test]
  async fn test_cached_pages_follow_remote_order() {
    let remote_order = catalog(1..11);
    let remote = ScriptedRemote::default();
    remote.page(None, 1, remote_order[0..4].to_vec(), false);
    remote.page(None, 2, remote_order[4..8].to_vec(), false);
    remote.page(None, 3, remote_order[8..10].to_vec(), true);
    let mediator = mediator(remote);
    let all = ListKey::all();

    let mut outcome = mediator.load(&all, LoadKind::Initial).await.unwrap();
    let mut last = mediator.store().page_after(None, 100).unwrap().last().map(|h| h.id);
    while !outcome.is_end_of_data() {
      outcome = mediator
        .load(&all, LoadKind::Append { last_hero_id: last })
        .await
        .unwrap();
      last = mediator.store().page_after(None, 100).unwrap().last().map(|h| h.id);
    }

    // Read back three heroes at a time
    let store = mediator.store();
    let mut seen = Vec::new();
    let mut after = None;
    loop {
      let page = store.page_after(after, 3).unwrap();
      if page.is_empty() {
        break;
      }
      after = page.last().map(|h| h.id);
      seen.extend(page);
    }
    assert_eq!(ids(&seen), ids(&remote_order));
  }

  #[tokio::test]
  async fn test_cancelled_load_commits_nothing() {
    let remote = ScriptedRemote::with_delay(Duration::from_millis(200));
    remote.page(None, 1, catalog(1..4), false);
    let mediator = mediator(remote);
    let all = ListKey::all();

    let result =
      tokio::time::timeout(Duration::from_millis(20), mediator.load(&all, LoadKind::Initial)).await;
    assert!(result.is_err());
    assert_eq!(mediator.store().count().unwrap(), 0);
    assert_eq!(mediator.store().list_state().unwrap(), None);

    // The lock was released with the dropped future
    let outcome = mediator.load(&all, LoadKind::Initial).await.unwrap();
    assert!(matches!(outcome, LoadOutcome::Loaded { count: 3, .. }));
  }

  #[tokio::test]
  async fn test_concurrent_loads_are_serialized() {
    let remote = ScriptedRemote::with_delay(Duration::from_millis(20));
    remote.page(None, 1, catalog(1..4), false);
    remote.page(None, 2, catalog(4..7), true);
    let mediator = Arc::new(mediator(remote));
    let all = ListKey::all();

    mediator.load(&all, LoadKind::Initial).await.unwrap();

    let append = LoadKind::Append {
      last_hero_id: Some(3),
    };
    let (a, b, c) = tokio::join!(
      mediator.load(&all, append),
      mediator.load(&all, append),
      mediator.load(&all, LoadKind::Initial),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(mediator.remote.max_in_flight.load(Ordering::SeqCst), 1);

    let store = mediator.store();
    assert_eq!(store.count().unwrap(), 6);
    assert_eq!(store.page_key(4).unwrap().unwrap().next_page, None);
    assert_eq!(store.page_key(1).unwrap().unwrap().next_page, Some(2));
  }

  #[tokio::test]
  async fn test_initialize() {
    let remote = ScriptedRemote::default();
    remote.page(None, 1, catalog(1..4), false);
    let mediator = mediator(remote);
    let all = ListKey::all();

    assert_eq!(
      mediator.initialize(&all).unwrap(),
      InitializeAction::LaunchInitialRefresh
    );

    mediator.load(&all, LoadKind::Initial).await.unwrap();
    assert_eq!(
      mediator.initialize(&all).unwrap(),
      InitializeAction::SkipInitialRefresh
    );
    assert_eq!(
      mediator.initialize(&ListKey::for_query(Some("sa"))).unwrap(),
      InitializeAction::LaunchInitialRefresh
    );
  }

  #[tokio::test]
  async fn test_initialize_after_timeout() {
    let remote = ScriptedRemote::default();
    remote.page(None, 1, catalog(1..4), false);
    let store = Arc::new(LocalStore::open_in_memory().unwrap());
    let mediator = PagedCacheMediator::new(remote, store, chrono::Duration::zero());
    let all = ListKey::all();

    mediator.load(&all, LoadKind::Initial).await.unwrap();
    assert_eq!(
      mediator.initialize(&all).unwrap(),
      InitializeAction::LaunchInitialRefresh
    );
  }

  #[tokio::test]
  async fn test_reads_see_previous_state_during_load() {
    let remote = ScriptedRemote::with_delay(Duration::from_millis(100));
    remote.page(None, 1, catalog(1..4), false);
    let mediator = Arc::new(mediator(remote));
    let all = ListKey::all();
    mediator.load(&all, LoadKind::Initial).await.unwrap();

    mediator.remote.page(None, 1, catalog(10..12), true);
    let refresh = {
      let mediator = Arc::clone(&mediator);
      let all = all.clone();
      tokio::spawn(async move { mediator.load(&all, LoadKind::Refresh).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(mediator.remote.in_flight.load(Ordering::SeqCst), 1);

    // The fetch is still sleeping; reads answer from the old list at once
    let reads = tokio::time::timeout(Duration::from_millis(50), async {
      let store = mediator.store();
      (
        store.page_after(None, 100).unwrap(),
        store.find_by_id(2).unwrap(),
        store.search("hero").unwrap(),
      )
    })
    .await
    .unwrap();
    assert_eq!(ids(&reads.0), vec![1, 2, 3]);
    assert_eq!(reads.1.name, "Hero2");
    assert_eq!(ids(&reads.2), vec![1, 2, 3]);
    assert!(!refresh.is_finished());

    let outcome = refresh.await.unwrap().unwrap();
    assert!(matches!(outcome, LoadOutcome::Loaded { count: 2, .. }));
    let store = mediator.store();
    assert_eq!(ids(&store.page_after(None, 100).unwrap()), vec![10, 11]);
    assert!(matches!(store.find_by_id(2), Err(crate::error::StoreError::NotFound(2))));
  }
}
