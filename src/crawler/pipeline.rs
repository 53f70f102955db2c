//! Harvest pipeline - drives a job from the scheduler into the store
//!
//! This module ties the pieces together:
//! - Running a [`Job`] through the [`Scheduler`]
//! - Upserting each record into a [`RecordStore`] as soon as it is yielded
//! - Recording a session row describing the completed job

use crate::config::Config;
use crate::crawler::fetcher::build_http_client;
use crate::crawler::scheduler::{Job, JobConfig, Scheduler};
use crate::record::ScrapeStatus;
use crate::storage::{RecordStore, SessionRecord, SqliteStore, UpsertOutcome};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::path::Path;

/// How often (in records) progress is logged
const PROGRESS_INTERVAL: usize = 10;

/// Summary of one completed job
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// URLs submitted with the job
    pub total_urls: usize,

    /// Records yielded by the scheduler, per status
    pub by_status: BTreeMap<ScrapeStatus, usize>,

    /// Records that replaced or created a stored row
    pub written: usize,

    /// Records ignored because the store already held a newer one
    pub stale: usize,

    /// Records never handed to the store (invalid URLs)
    pub skipped: usize,
}

impl JobReport {
    pub fn successful(&self) -> usize {
        self.count(ScrapeStatus::Success)
    }

    /// Persisted records with a failure status
    pub fn failed(&self) -> usize {
        self.by_status
            .iter()
            .filter(|(status, _)| !status.is_success() && status.is_persistable())
            .map(|(_, count)| count)
            .sum()
    }

    pub fn count(&self, status: ScrapeStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn duration_seconds(&self) -> f64 {
        (self.finished_at - self.started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    fn to_session(&self, config_hash: &str) -> SessionRecord {
        SessionRecord {
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            total_urls: self.total_urls as u64,
            successful: self.successful() as u64,
            failed: self.failed() as u64,
            skipped: self.skipped as u64,
            duration_seconds: self.duration_seconds(),
            config_hash: config_hash.to_string(),
        }
    }
}

/// Runs a job and persists every record it yields
///
/// Records are upserted one at a time, in the order the scheduler yields
/// them. A failed upsert stops the job immediately and is returned as
/// [`HarvestError::StorageUnavailable`]; per-URL scrape failures never stop
/// it. When the job completes, a session row is recorded with the given
/// config hash.
///
/// # Arguments
///
/// * `scheduler` - Scheduler holding the HTTP client
/// * `store` - Destination store, possibly shared with other jobs
/// * `job` - URLs and pacing settings
/// * `config_hash` - Hash of the configuration that produced the job
pub async fn harvest<S>(
    scheduler: &Scheduler,
    store: &S,
    job: Job,
    config_hash: &str,
) -> Result<JobReport, HarvestError>
where
    S: RecordStore + ?Sized,
{
    let started_at = Utc::now();
    let session_id = started_at.format("%Y%m%d_%H%M%S_%6f").to_string();
    let total_urls = job.len();

    tracing::info!(
        "Starting harvest session {} with {} URLs (delay {:?})",
        session_id,
        total_urls,
        job.config.delay
    );

    let mut report = JobReport {
        session_id,
        started_at,
        finished_at: started_at,
        total_urls,
        by_status: BTreeMap::new(),
        written: 0,
        stale: 0,
        skipped: 0,
    };

    let mut records = scheduler.run(job);
    let mut processed = 0;

    while let Some(record) = records.next().await {
        processed += 1;
        *report.by_status.entry(record.status).or_insert(0) += 1;

        if !record.status.is_persistable() {
            tracing::warn!("Not storing {:?}: {}", record.url, record.status);
            report.skipped += 1;
        } else {
            match store.upsert(&record) {
                Ok(UpsertOutcome::Written) => report.written += 1,
                Ok(UpsertOutcome::Stale) => report.stale += 1,
                Err(source) => {
                    tracing::error!("Failed to store {}: {}", record.url, source);
                    return Err(HarvestError::StorageUnavailable {
                        url: record.url,
                        source,
                    });
                }
            }
        }

        if processed % PROGRESS_INTERVAL == 0 {
            let elapsed = (Utc::now() - started_at).num_milliseconds() as f64 / 1000.0;
            tracing::info!(
                "Progress: {}/{} URLs, {} successful, {:.1}s elapsed",
                processed,
                total_urls,
                report.successful(),
                elapsed
            );
        }
    }

    report.finished_at = Utc::now();

    store
        .record_session(&report.to_session(config_hash))
        .map_err(|source| HarvestError::StorageUnavailable {
            url: format!("session {}", report.session_id),
            source,
        })?;

    tracing::info!(
        "Harvest session {} finished: {} successful, {} failed, {} skipped in {:.1}s",
        report.session_id,
        report.successful(),
        report.failed(),
        report.skipped,
        report.duration_seconds()
    );

    Ok(report)
}

/// Runs the job described by a configuration file
///
/// Opens the configured store, builds the HTTP client and harvests
/// `[job].urls` with the `[scraper]` settings.
///
/// # Example
///
/// ```no_run
/// use page_harvest::config::load_config_with_hash;
/// use page_harvest::crawler::run_harvest;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("config.toml"))?;
/// let report = run_harvest(&config, &hash).await?;
/// println!("{} pages stored", report.written);
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(config: &Config, config_hash: &str) -> Result<JobReport, HarvestError> {
    let store = SqliteStore::open(Path::new(&config.output.database_path))?;
    let scheduler = Scheduler::new(build_http_client(&config.user_agent)?);
    let job = Job::new(config.job.urls.iter().cloned(), JobConfig::try_from(&config.scraper)?);

    harvest(&scheduler, &store, job, config_hash).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UserAgentConfig;
    use crate::record::Record;
    use crate::storage::{Snapshot, StorageError, StorageResult};
    use std::time::Duration;

    fn test_scheduler() -> Scheduler {
        let config = UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        };
        Scheduler::new(build_http_client(&config).unwrap())
    }

    fn fast_job(urls: &[&str]) -> Job {
        Job::new(
            urls.iter().copied(),
            JobConfig {
                delay: Duration::ZERO,
                timeout: Duration::from_millis(500),
                max_retries: 0,
                retry_delay: Duration::ZERO,
            },
        )
    }

    /// A store whose writes always fail
    struct BrokenStore;

    impl RecordStore for BrokenStore {
        fn upsert(&self, _record: &Record) -> StorageResult<UpsertOutcome> {
            Err(StorageError::Unavailable("disk gone".to_string()))
        }
        fn get(&self, _url: &str) -> StorageResult<Option<Record>> {
            Ok(None)
        }
        fn all(&self) -> StorageResult<Snapshot> {
            Ok(Snapshot::new(Vec::new(), Utc::now()))
        }
        fn count(&self) -> StorageResult<u64> {
            Ok(0)
        }
        fn record_session(&self, _session: &SessionRecord) -> StorageResult<i64> {
            Err(StorageError::Unavailable("disk gone".to_string()))
        }
        fn latest_session(&self) -> StorageResult<Option<SessionRecord>> {
            Ok(None)
        }
        fn sessions(&self) -> StorageResult<Vec<SessionRecord>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_invalid_urls_are_skipped_and_session_recorded() {
        let store = SqliteStore::open_in_memory().unwrap();

        let report = harvest(
            &test_scheduler(),
            &store,
            fast_job(&["not a url", "mailto:someone@example.com"]),
            "hash",
        )
        .await
        .unwrap();

        assert_eq!(report.total_urls, 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.count(ScrapeStatus::InvalidUrl), 2);
        assert_eq!(store.count().unwrap(), 0);

        let session = store.latest_session().unwrap().unwrap();
        assert_eq!(session.session_id, report.session_id);
        assert_eq!(session.skipped, 2);
        assert_eq!(session.config_hash, "hash");
    }

    #[tokio::test]
    async fn test_store_failure_is_surfaced() {
        // Nothing listens on port 1, so the fetch fails fast and yields a
        // storable HTTP_ERROR record
        let result = harvest(
            &test_scheduler(),
            &BrokenStore,
            fast_job(&["http://127.0.0.1:1/"]),
            "hash",
        )
        .await;

        match result {
            Err(HarvestError::StorageUnavailable { url, .. }) => {
                assert_eq!(url, "http://127.0.0.1:1/");
            }
            other => panic!("expected StorageUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_report_counts() {
        let now = Utc::now();
        let mut by_status = BTreeMap::new();
        by_status.insert(ScrapeStatus::Success, 3);
        by_status.insert(ScrapeStatus::Timeout, 1);
        by_status.insert(ScrapeStatus::HttpError, 2);
        by_status.insert(ScrapeStatus::InvalidUrl, 1);

        let report = JobReport {
            session_id: "s".to_string(),
            started_at: now,
            finished_at: now + chrono::Duration::milliseconds(1500),
            total_urls: 7,
            by_status,
            written: 6,
            stale: 0,
            skipped: 1,
        };

        assert_eq!(report.successful(), 3);
        assert_eq!(report.failed(), 3);
        assert_eq!(report.duration_seconds(), 1.5);

        let session = report.to_session("abc");
        assert_eq!(session.total_urls, 7);
        assert_eq!(session.failed, 3);
        assert_eq!(session.skipped, 1);
    }
}
