//! Hero rows: ordered paging, point lookups and name search.

use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};

use crate::error::{StoreError, StoreResult};
use crate::hero::types::Hero;

const HERO_COLUMNS: &str =
  "id, name, image, about, rating, power, month, day, family, abilities, nature_types";

/// Hero table operations over a borrowed connection or transaction.
pub struct HeroStore<'c> {
  conn: &'c Connection,
}

impl<'c> HeroStore<'c> {
  pub fn new(conn: &'c Connection) -> Self {
    Self { conn }
  }

  /// Heroes ordered by rating descending then id ascending, strictly after
  /// `after` in that order. `None` starts at the top.
  pub fn page_after(&self, after: Option<i64>, limit: usize) -> StoreResult<Vec<Hero>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let Some(after) = after else {
      let mut stmt = self.conn.prepare(&format!(
        "SELECT {HERO_COLUMNS} FROM heroes ORDER BY rating DESC, id ASC LIMIT ?"
      ))?;
      let heroes = stmt
        .query_map(params![limit], row_to_hero)?
        .collect::<Result<Vec<_>, _>>()?;
      return Ok(heroes);
    };

    let anchor_rating: f64 = self
      .conn
      .query_row(
        "SELECT rating FROM heroes WHERE id = ?",
        params![after],
        |row| row.get(0),
      )
      .optional()?
      .ok_or(StoreError::NotFound(after))?;

    let mut stmt = self.conn.prepare(&format!(
      "SELECT {HERO_COLUMNS} FROM heroes
       WHERE rating < ?1 OR (rating = ?1 AND id > ?2)
       ORDER BY rating DESC, id ASC LIMIT ?3"
    ))?;
    let heroes = stmt
      .query_map(params![anchor_rating, after, limit], row_to_hero)?
      .collect::<Result<Vec<_>, _>>()?;
    Ok(heroes)
  }

  /// Insert or replace heroes by id.
  pub fn insert_all(&self, heroes: &[Hero]) -> StoreResult<()> {
    let mut stmt = self.conn.prepare(
      "INSERT INTO heroes (id, name, image, about, rating, power, month, day, family, abilities, nature_types)
       VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
       ON CONFLICT(id) DO UPDATE SET
         name = excluded.name,
         image = excluded.image,
         about = excluded.about,
         rating = excluded.rating,
         power = excluded.power,
         month = excluded.month,
         day = excluded.day,
         family = excluded.family,
         abilities = excluded.abilities,
         nature_types = excluded.nature_types",
    )?;

    for hero in heroes {
      stmt.execute(params![
        hero.id,
        hero.name,
        hero.image,
        hero.about,
        hero.rating,
        hero.power,
        hero.month,
        hero.day,
        serde_json::to_string(&hero.family)?,
        serde_json::to_string(&hero.abilities)?,
        serde_json::to_string(&hero.nature_types)?,
      ])?;
    }

    Ok(())
  }

  pub fn clear_all(&self) -> StoreResult<()> {
    self.conn.execute("DELETE FROM heroes", [])?;
    Ok(())
  }

  pub fn find_by_id(&self, id: i64) -> StoreResult<Hero> {
    self
      .conn
      .query_row(
        &format!("SELECT {HERO_COLUMNS} FROM heroes WHERE id = ?"),
        params![id],
        row_to_hero,
      )
      .optional()?
      .ok_or(StoreError::NotFound(id))
  }

  /// Case-insensitive substring match on the name. Blank terms match nothing.
  pub fn search(&self, term: &str) -> StoreResult<Vec<Hero>> {
    let term = term.trim();
    if term.is_empty() {
      return Ok(Vec::new());
    }

    let mut stmt = self.conn.prepare(&format!(
      "SELECT {HERO_COLUMNS} FROM heroes
       WHERE instr(lower(name), lower(?)) > 0
       ORDER BY rating DESC, id ASC"
    ))?;
    let heroes = stmt
      .query_map(params![term], row_to_hero)?
      .collect::<Result<Vec<_>, _>>()?;
    Ok(heroes)
  }

  pub fn count(&self) -> StoreResult<usize> {
    let count: i64 = self
      .conn
      .query_row("SELECT COUNT(*) FROM heroes", [], |row| row.get(0))?;
    Ok(usize::try_from(count).unwrap_or_default())
  }
}

fn row_to_hero(row: &Row<'_>) -> rusqlite::Result<Hero> {
  Ok(Hero {
    id: row.get(0)?,
    name: row.get(1)?,
    image: row.get(2)?,
    about: row.get(3)?,
    rating: row.get(4)?,
    power: row.get(5)?,
    month: row.get(6)?,
    day: row.get(7)?,
    family: json_list(row, 8)?,
    abilities: json_list(row, 9)?,
    nature_types: json_list(row, 10)?,
  })
}

/// String lists are stored as JSON arrays.
fn json_list(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
  let raw: String = row.get(idx)?;
  serde_json::from_str(&raw)
    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
