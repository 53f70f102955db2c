//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Page Harvest database.

/// Current schema version, stored in `PRAGMA user_version`
pub const SCHEMA_VERSION: u32 = 1;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per normalized URL; replaced whole on every accepted upsert
CREATE TABLE IF NOT EXISTS records (
    url TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    title TEXT,
    text TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    fetched_at TEXT NOT NULL,
    http_code INTEGER
);

CREATE INDEX IF NOT EXISTS idx_records_status ON records(status);
CREATE INDEX IF NOT EXISTS idx_records_fetched_at ON records(fetched_at);

-- One row per completed harvest job
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    total_urls INTEGER NOT NULL,
    successful INTEGER NOT NULL,
    failed INTEGER NOT NULL,
    skipped INTEGER NOT NULL,
    duration_seconds REAL NOT NULL,
    config_hash TEXT NOT NULL
);
"#;

/// Upsert with stale-write rejection in a single statement
///
/// The `WHERE` clause on the conflict branch turns the write into a no-op
/// when the stored row is at least as new as the incoming one. Timestamps
/// are fixed-width RFC 3339 strings, so text comparison is chronological.
pub const UPSERT_RECORD_SQL: &str = r#"
INSERT INTO records (url, status, title, text, metadata, fetched_at, http_code)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
ON CONFLICT(url) DO UPDATE SET
    status = excluded.status,
    title = excluded.title,
    text = excluded.text,
    metadata = excluded.metadata,
    fetched_at = excluded.fetched_at,
    http_code = excluded.http_code
WHERE excluded.fetched_at > records.fetched_at
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

/// Reads the schema version recorded in the database
pub fn get_schema_version(conn: &rusqlite::Connection) -> Result<u32, rusqlite::Error> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}
