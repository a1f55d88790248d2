/// One catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Hero {
  pub id: i64,
  pub name: String,
  /// Server-relative image path, e.g. `/images/sasuke.jpg`
  pub image: String,
  pub about: String,
  pub rating: f64,
  pub power: i64,
  pub month: String,
  pub day: String,
  pub family: Vec<String>,
  pub abilities: Vec<String>,
  pub nature_types: Vec<String>,
}

/// Pagination cursors recorded for a cached hero.
///
/// `None` means there is no such page, not that it is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageKey {
  pub hero_id: i64,
  pub prev_page: Option<u32>,
  pub next_page: Option<u32>,
}
