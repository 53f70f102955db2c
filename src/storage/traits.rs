//! Storage traits and error types
//!
//! This module defines the trait interface for record stores and
//! associated error types.

use crate::record::{Record, RecordViolation, ScrapeStatus};
use crate::storage::{SessionRecord, Snapshot};
use crate::UrlError;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] RecordViolation),

    #[error("Record URL cannot be normalized: {0}")]
    InvalidUrl(#[from] UrlError),

    #[error("Records with status {status} are never stored ({url})")]
    NotPersistable { url: String, status: ScrapeStatus },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt row for {url}: {message}")]
    CorruptRow { url: String, message: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Whether an upsert changed the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The record was inserted or replaced the previous row
    Written,

    /// A row at least as new already existed; nothing changed
    Stale,
}

/// Trait for durable record stores
///
/// Implementations are shared between concurrently running jobs, so every
/// method takes `&self` and implementations synchronize internally.
pub trait RecordStore: Send + Sync {
    // ===== Records =====

    /// Inserts or replaces the record keyed by its normalized URL
    ///
    /// The stored URL is the normalized form of `record.url`. When a row for
    /// that URL exists with `fetched_at` greater than or equal to the
    /// incoming record's, the call is a no-op and returns
    /// [`UpsertOutcome::Stale`]. A successful return means the write is
    /// committed to durable storage.
    fn upsert(&self, record: &Record) -> StorageResult<UpsertOutcome>;

    /// Gets the record for a URL (normalized before lookup)
    fn get(&self, url: &str) -> StorageResult<Option<Record>>;

    /// Reads a consistent point-in-time snapshot of every record
    fn all(&self) -> StorageResult<Snapshot>;

    /// Counts stored records
    fn count(&self) -> StorageResult<u64>;

    // ===== Sessions =====

    /// Records a completed harvest session, returning its row ID
    fn record_session(&self, session: &SessionRecord) -> StorageResult<i64>;

    /// Gets the most recently recorded session
    fn latest_session(&self) -> StorageResult<Option<SessionRecord>>;

    /// Gets every recorded session, oldest first
    fn sessions(&self) -> StorageResult<Vec<SessionRecord>>;
}
