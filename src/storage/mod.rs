//! Storage module for persisting scraped records
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Deduplicating, stale-write-rejecting record upserts
//! - Consistent snapshots for exports and analytics
//! - Harvest session bookkeeping

mod schema;
mod sqlite;
mod traits;

pub use schema::{get_schema_version, SCHEMA_VERSION};
pub use sqlite::SqliteStore;
pub use traits::{RecordStore, StorageError, StorageResult, UpsertOutcome};

use crate::record::Record;
use chrono::{DateTime, Utc};

/// A consistent, point-in-time read of every stored record
///
/// Snapshots are plain values: iterating one never touches the database, so
/// it can be iterated any number of times and never observes later writes.
#[derive(Debug, Clone)]
pub struct Snapshot {
    records: Vec<Record>,
    taken_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(records: Vec<Record>, taken_at: DateTime<Utc>) -> Self {
        Self { records, taken_at }
    }

    /// Iterates the records in storage order
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// When the snapshot was read
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Represents one completed harvest job
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_urls: u64,
    pub successful: u64,
    pub failed: u64,
    /// URLs that produced no storable record (invalid URLs)
    pub skipped: u64,
    pub duration_seconds: f64,
    pub config_hash: String,
}

impl SessionRecord {
    /// Percentage of URLs that were scraped successfully
    pub fn success_rate(&self) -> f64 {
        if self.total_urls == 0 {
            0.0
        } else {
            (self.successful as f64 / self.total_urls as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ScrapeStatus;

    fn session(total: u64, successful: u64) -> SessionRecord {
        SessionRecord {
            session_id: "20240101_000000".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            total_urls: total,
            successful,
            failed: total - successful,
            skipped: 0,
            duration_seconds: 1.0,
            config_hash: String::new(),
        }
    }

    #[test]
    fn test_session_success_rate() {
        assert_eq!(session(4, 3).success_rate(), 75.0);
        assert_eq!(session(0, 0).success_rate(), 0.0);
    }

    #[test]
    fn test_snapshot_is_restartable() {
        let records = vec![
            Record::failure("https://a.example/", ScrapeStatus::Timeout, None, Utc::now()),
            Record::failure("https://b.example/", ScrapeStatus::Timeout, None, Utc::now()),
        ];
        let snapshot = Snapshot::new(records, Utc::now());

        let first: Vec<&str> = snapshot.iter().map(|r| r.url.as_str()).collect();
        let second: Vec<&str> = (&snapshot).into_iter().map(|r| r.url.as_str()).collect();

        assert_eq!(first, second);
        assert_eq!(snapshot.len(), 2);
    }
}
