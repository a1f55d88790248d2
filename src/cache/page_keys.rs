//! Per-hero remote page cursors.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreResult;
use crate::hero::types::PageKey;

pub struct PageKeyStore<'c> {
  conn: &'c Connection,
}

impl<'c> PageKeyStore<'c> {
  pub fn new(conn: &'c Connection) -> Self {
    Self { conn }
  }

  /// `None` when the hero has never been cached.
  pub fn get(&self, hero_id: i64) -> StoreResult<Option<PageKey>> {
    let key = self
      .conn
      .query_row(
        "SELECT hero_id, prev_page, next_page FROM hero_page_keys WHERE hero_id = ?",
        params![hero_id],
        |row| {
          Ok(PageKey {
            hero_id: row.get(0)?,
            prev_page: row.get(1)?,
            next_page: row.get(2)?,
          })
        },
      )
      .optional()?;
    Ok(key)
  }

  pub fn upsert_all(&self, keys: &[PageKey]) -> StoreResult<()> {
    let mut stmt = self.conn.prepare(
      "INSERT INTO hero_page_keys (hero_id, prev_page, next_page) VALUES (?, ?, ?)
       ON CONFLICT(hero_id) DO UPDATE SET
         prev_page = excluded.prev_page,
         next_page = excluded.next_page",
    )?;

    for key in keys {
      stmt.execute(params![key.hero_id, key.prev_page, key.next_page])?;
    }

    Ok(())
  }

  pub fn clear(&self) -> StoreResult<()> {
    self.conn.execute("DELETE FROM hero_page_keys", [])?;
    Ok(())
  }
}
