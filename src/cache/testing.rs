//! Scripted remote source and fixtures shared by cache tests.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) use super::items::tests::hero;
use super::traits::{RemotePage, RemoteSource};
use crate::error::FetchError;
use crate::hero::types::Hero;

type PageScript = HashMap<(Option<String>, u32), Result<RemotePage, FetchError>>;

/// Remote source answering from a fixed script and counting calls.
#[derive(Default)]
pub(crate) struct ScriptedRemote {
  pages: std::sync::Mutex<PageScript>,
  pub(crate) calls: AtomicUsize,
  pub(crate) in_flight: AtomicUsize,
  pub(crate) max_in_flight: AtomicUsize,
  delay: Option<Duration>,
}

impl ScriptedRemote {
  pub(crate) fn with_delay(delay: Duration) -> Self {
    Self {
      delay: Some(delay),
      ..Self::default()
    }
  }

  pub(crate) fn set(&self, query: Option<&str>, page: u32, result: Result<RemotePage, FetchError>) {
    self
      .pages
      .lock()
      .unwrap()
      .insert((query.map(String::from), page), result);
  }

  pub(crate) fn page(&self, query: Option<&str>, page: u32, heroes: Vec<Hero>, is_last: bool) {
    self.set(query, page, Ok(RemotePage { heroes, is_last }));
  }

  pub(crate) fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl RemoteSource for ScriptedRemote {
  fn fetch_page<'a>(
    &'a self,
    query: Option<&'a str>,
    page: u32,
  ) -> BoxFuture<'a, Result<RemotePage, FetchError>> {
    async move {
      self.calls.fetch_add(1, Ordering::SeqCst);
      let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
      self.max_in_flight.fetch_max(now, Ordering::SeqCst);

      if let Some(delay) = self.delay {
        tokio::time::sleep(delay).await;
      }

      self.in_flight.fetch_sub(1, Ordering::SeqCst);
      self
        .pages
        .lock()
        .unwrap()
        .get(&(query.map(String::from), page))
        .cloned()
        .unwrap_or_else(|| Err(FetchError::Response(format!("no page {}", page))))
    }
    .boxed()
  }
}

/// Heroes in remote order: rating descending with pairwise ties, ids ascending.
pub(crate) fn catalog(range: std::ops::Range<i64>) -> Vec<Hero> {
  range
    .map(|id| hero(id, &format!("Hero{}", id), 5.0 - ((id - 1) / 2) as f64 * 0.25))
    .collect()
}
