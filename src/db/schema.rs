/// Schema for the hero cache.
///
/// `heroes` and `hero_page_keys` always change together inside one
/// transaction; `list_state` holds a single row naming the list they mirror.
pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS heroes (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    image TEXT NOT NULL,
    about TEXT NOT NULL,
    rating REAL NOT NULL,
    power INTEGER NOT NULL,
    month TEXT NOT NULL,
    day TEXT NOT NULL,
    family TEXT NOT NULL,
    abilities TEXT NOT NULL,
    nature_types TEXT NOT NULL
);

-- Matches the remote ordering: rating descending, id ascending
CREATE INDEX IF NOT EXISTS idx_heroes_order ON heroes(rating DESC, id ASC);

CREATE TABLE IF NOT EXISTS hero_page_keys (
    hero_id INTEGER PRIMARY KEY,
    prev_page INTEGER,
    next_page INTEGER,
    FOREIGN KEY (hero_id) REFERENCES heroes(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS list_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    query_hash TEXT NOT NULL,
    description TEXT NOT NULL,
    refreshed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
