//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RecordStore trait.

use crate::record::{format_timestamp, parse_timestamp, Record, ScrapeStatus};
use crate::storage::schema::{initialize_schema, UPSERT_RECORD_SQL};
use crate::storage::traits::{RecordStore, StorageError, StorageResult, UpsertOutcome};
use crate::storage::{SessionRecord, Snapshot};
use crate::url::normalize_url;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const RECORD_COLUMNS: &str = "url, status, title, text, metadata, fetched_at, http_code";

const SESSION_COLUMNS: &str = "session_id, started_at, finished_at, total_urls, successful, \
     failed, skipped, duration_seconds, config_hash";

/// How long a writer waits on a lock held by another connection
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite record store
///
/// The connection sits behind a mutex so concurrent jobs can share one
/// store through `&self`. Every upsert is a single autocommitted statement,
/// and `synchronous = FULL` makes the commit durable before it returns.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates the store at `path`
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError::Unavailable)` - The file could not be opened or initialized
    pub fn open(path: &Path) -> StorageResult<Self> {
        let unavailable =
            |e: rusqlite::Error| StorageError::Unavailable(format!("{}: {}", path.display(), e));

        let conn = Connection::open(path).map_err(unavailable)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(unavailable)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA temp_store = MEMORY;
        ",
        )
        .map_err(unavailable)?;

        initialize_schema(&conn).map_err(unavailable)?;

        tracing::debug!("Opened record store at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory store; contents vanish when it is dropped
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("connection lock poisoned".to_string()))
    }
}

impl RecordStore for SqliteStore {
    // ===== Records =====

    fn upsert(&self, record: &Record) -> StorageResult<UpsertOutcome> {
        if !record.status.is_persistable() {
            return Err(StorageError::NotPersistable {
                url: record.url.clone(),
                status: record.status,
            });
        }
        record.check_invariants()?;

        let url = normalize_url(&record.url)?;
        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let conn = self.lock()?;
        let changed = conn.execute(
            UPSERT_RECORD_SQL,
            params![
                url.as_str(),
                record.status.as_str(),
                record.title,
                record.text,
                metadata,
                format_timestamp(&record.fetched_at),
                record.http_code,
            ],
        )?;

        if changed == 0 {
            tracing::debug!("Ignored stale record for {}", url);
            Ok(UpsertOutcome::Stale)
        } else {
            Ok(UpsertOutcome::Written)
        }
    }

    fn get(&self, url: &str) -> StorageResult<Option<Record>> {
        let url = normalize_url(url)?;
        let conn = self.lock()?;

        let raw = conn
            .query_row(
                &format!("SELECT {} FROM records WHERE url = ?1", RECORD_COLUMNS),
                params![url.as_str()],
                RawRecord::from_row,
            )
            .optional()?;

        raw.map(RawRecord::into_record).transpose()
    }

    fn all(&self) -> StorageResult<Snapshot> {
        let conn = self.lock()?;
        let taken_at = Utc::now();

        // One statement reads one consistent version of the table
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM records ORDER BY rowid",
            RECORD_COLUMNS
        ))?;
        let raws = stmt
            .query_map([], RawRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let records = raws
            .into_iter()
            .map(RawRecord::into_record)
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(Snapshot::new(records, taken_at))
    }

    fn count(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Sessions =====

    fn record_session(&self, session: &SessionRecord) -> StorageResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO sessions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                SESSION_COLUMNS
            ),
            params![
                session.session_id,
                format_timestamp(&session.started_at),
                format_timestamp(&session.finished_at),
                session.total_urls as i64,
                session.successful as i64,
                session.failed as i64,
                session.skipped as i64,
                session.duration_seconds,
                session.config_hash,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn latest_session(&self) -> StorageResult<Option<SessionRecord>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM sessions ORDER BY id DESC LIMIT 1",
                    SESSION_COLUMNS
                ),
                [],
                RawSession::from_row,
            )
            .optional()?;

        raw.map(RawSession::into_session).transpose()
    }

    fn sessions(&self) -> StorageResult<Vec<SessionRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sessions ORDER BY id ASC",
            SESSION_COLUMNS
        ))?;
        let raws = stmt
            .query_map([], RawSession::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        raws.into_iter().map(RawSession::into_session).collect()
    }
}

/// A records row as stored, before its text columns are decoded
struct RawRecord {
    url: String,
    status: String,
    title: Option<String>,
    text: Option<String>,
    metadata: String,
    fetched_at: String,
    http_code: Option<u16>,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            url: row.get(0)?,
            status: row.get(1)?,
            title: row.get(2)?,
            text: row.get(3)?,
            metadata: row.get(4)?,
            fetched_at: row.get(5)?,
            http_code: row.get(6)?,
        })
    }

    fn into_record(self) -> StorageResult<Record> {
        let status = ScrapeStatus::from_label(&self.status)
            .ok_or_else(|| corrupt(&self.url, format!("unknown status {:?}", self.status)))?;
        let fetched_at = parse_timestamp(&self.fetched_at)
            .map_err(|e| corrupt(&self.url, format!("bad fetched_at: {}", e)))?;
        let metadata: BTreeMap<String, String> = serde_json::from_str(&self.metadata)
            .map_err(|e| corrupt(&self.url, format!("bad metadata: {}", e)))?;

        Ok(Record {
            url: self.url,
            status,
            title: self.title,
            text: self.text,
            metadata,
            fetched_at,
            http_code: self.http_code,
        })
    }
}

struct RawSession {
    session_id: String,
    started_at: String,
    finished_at: String,
    total_urls: i64,
    successful: i64,
    failed: i64,
    skipped: i64,
    duration_seconds: f64,
    config_hash: String,
}

impl RawSession {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            session_id: row.get(0)?,
            started_at: row.get(1)?,
            finished_at: row.get(2)?,
            total_urls: row.get(3)?,
            successful: row.get(4)?,
            failed: row.get(5)?,
            skipped: row.get(6)?,
            duration_seconds: row.get(7)?,
            config_hash: row.get(8)?,
        })
    }

    fn into_session(self) -> StorageResult<SessionRecord> {
        let parse = |s: &str| -> StorageResult<DateTime<Utc>> {
            parse_timestamp(s).map_err(|e| corrupt(&self.session_id, format!("bad timestamp: {}", e)))
        };

        Ok(SessionRecord {
            started_at: parse(&self.started_at)?,
            finished_at: parse(&self.finished_at)?,
            total_urls: self.total_urls.max(0) as u64,
            successful: self.successful.max(0) as u64,
            failed: self.failed.max(0) as u64,
            skipped: self.skipped.max(0) as u64,
            duration_seconds: self.duration_seconds,
            config_hash: self.config_hash.clone(),
            session_id: self.session_id.clone(),
        })
    }
}

fn corrupt(url: &str, message: String) -> StorageError {
    StorageError::CorruptRow {
        url: url.to_string(),
        message,
    }
}
