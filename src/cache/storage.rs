//! SQLite-backed local store for heroes, their page keys, and list state.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::items::HeroStore;
use super::page_keys::PageKeyStore;
use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::hero::types::{Hero, PageKey};

const ONBOARDING_KEY: &str = "onboarding_completed";

/// The logical list currently mirrored by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListState {
  /// Hash of the normalized query
  pub query_hash: String,
  pub description: String,
  /// Last initial or refresh load
  pub refreshed_at: DateTime<Utc>,
}

/// Everything one successful fetch writes, committed as a unit.
#[derive(Debug, Clone)]
pub struct PageWrite {
  /// Discard all heroes, keys and list state first
  pub clear: bool,
  /// Replaces the list state when set
  pub list: Option<ListState>,
  pub heroes: Vec<Hero>,
  pub keys: Vec<PageKey>,
}

/// Local store: the durable, query-able hero cache.
///
/// Reads and writes share one connection lock, and writes hold it for the
/// whole transaction, so readers never observe a half-written page.
pub struct LocalStore {
  conn: Mutex<Connection>,
}

impl LocalStore {
  /// Open the store at `path`, or at the default data location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    Ok(Self::from_database(Database::open(path)?))
  }

  pub fn open_in_memory() -> Result<Self> {
    Ok(Self::from_database(Database::open_in_memory()?))
  }

  pub fn from_database(db: Database) -> Self {
    Self {
      conn: Mutex::new(db.into_conn()),
    }
  }

  fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|_| StoreError::Poisoned)
  }

  pub fn page_after(&self, after: Option<i64>, limit: usize) -> StoreResult<Vec<Hero>> {
    let conn = self.lock()?;
    HeroStore::new(&conn).page_after(after, limit)
  }

  pub fn find_by_id(&self, id: i64) -> StoreResult<Hero> {
    let conn = self.lock()?;
    HeroStore::new(&conn).find_by_id(id)
  }

  pub fn search(&self, term: &str) -> StoreResult<Vec<Hero>> {
    let conn = self.lock()?;
    HeroStore::new(&conn).search(term)
  }

  pub fn count(&self) -> StoreResult<usize> {
    let conn = self.lock()?;
    HeroStore::new(&conn).count()
  }

  pub fn page_key(&self, hero_id: i64) -> StoreResult<Option<PageKey>> {
    let conn = self.lock()?;
    PageKeyStore::new(&conn).get(hero_id)
  }

  pub fn list_state(&self) -> StoreResult<Option<ListState>> {
    let conn = self.lock()?;
    let row: Option<(String, String, String)> = conn
      .query_row(
        "SELECT query_hash, description, refreshed_at FROM list_state WHERE id = 1",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()?;

    let Some((query_hash, description, refreshed_at)) = row else {
      return Ok(None);
    };

    // An unreadable timestamp only makes the list look stale.
    let refreshed_at = DateTime::parse_from_rfc3339(&refreshed_at)
      .map(|dt| dt.with_timezone(&Utc))
      .unwrap_or(DateTime::<Utc>::MIN_UTC);

    Ok(Some(ListState {
      query_hash,
      description,
      refreshed_at,
    }))
  }

  /// Commit one fetched page: optional clear, heroes, keys, list state.
  ///
  /// Any failure rolls the whole write back.
  pub fn write_page(&self, write: &PageWrite) -> StoreResult<()> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;

    {
      let heroes = HeroStore::new(&tx);
      let keys = PageKeyStore::new(&tx);

      if write.clear {
        keys.clear()?;
        heroes.clear_all()?;
        tx.execute("DELETE FROM list_state", [])?;
      }

      heroes.insert_all(&write.heroes)?;
      keys.upsert_all(&write.keys)?;

      if let Some(list) = &write.list {
        tx.execute(
          "INSERT OR REPLACE INTO list_state (id, query_hash, description, refreshed_at)
           VALUES (1, ?, ?, ?)",
          params![
            list.query_hash,
            list.description,
            list.refreshed_at.to_rfc3339()
          ],
        )?;
      }
    }

    tx.commit()?;
    Ok(())
  }

  pub fn onboarding_completed(&self) -> StoreResult<bool> {
    let conn = self.lock()?;
    let value: Option<String> = conn
      .query_row(
        "SELECT value FROM settings WHERE key = ?",
        params![ONBOARDING_KEY],
        |row| row.get(0),
      )
      .optional()?;
    Ok(value.as_deref() == Some("true"))
  }

  pub fn set_onboarding_completed(&self, completed: bool) -> StoreResult<()> {
    let conn = self.lock()?;
    conn.execute(
      "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
      params![ONBOARDING_KEY, completed.to_string()],
    )?;
    Ok(())
  }

  #[cfg(test)]
  pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
    let conn = self.conn.lock().unwrap();
    f(&conn)
  }
}
