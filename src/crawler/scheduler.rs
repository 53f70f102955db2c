//! Scheduler for pacing a job's requests
//!
//! This module handles:
//! - Turning a [`Job`] into a lazy stream of [`Record`]s
//! - Enforcing the politeness delay between requests issued by the same job
//! - Mapping fetch outcomes onto record statuses
//!
//! Each job is a single sequential flow: one request at a time, in
//! submission order, with the delay measured from when the previous request
//! of the same job was issued. Separate jobs do not share pacing state.

use crate::config::ScraperConfig;
use crate::crawler::extractor::extract;
use crate::crawler::fetcher::{fetch_url, FetchOptions, FetchResult};
use crate::record::{Record, ScrapeStatus};
use crate::url::normalize_url;
use crate::ConfigError;
use async_stream::stream;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use std::time::Duration;
use tokio::time::Instant;

/// Rate and retry settings for one job
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobConfig {
    /// Minimum time between two requests issued by the job
    pub delay: Duration,

    /// Timeout for each request attempt
    pub timeout: Duration,

    /// Extra attempts after a transient failure
    pub max_retries: u32,

    /// Fixed pause before each retry
    pub retry_delay: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            timeout: Duration::from_secs(10),
            max_retries: 2,
            retry_delay: Duration::ZERO,
        }
    }
}

impl TryFrom<&ScraperConfig> for JobConfig {
    type Error = ConfigError;

    fn try_from(config: &ScraperConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            delay: seconds_to_duration("delay_seconds", config.delay_seconds)?,
            timeout: seconds_to_duration("timeout_seconds", config.timeout_seconds)?,
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }
}

fn seconds_to_duration(name: &str, seconds: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(seconds).map_err(|e| {
        ConfigError::Validation(format!(
            "{} cannot be used as a duration ({}): {}",
            name, seconds, e
        ))
    })
}

impl JobConfig {
    /// The per-request limits handed to the fetcher
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: self.timeout,
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
        }
    }
}

/// An ordered list of URLs scraped together under one configuration
#[derive(Debug, Clone)]
pub struct Job {
    pub urls: Vec<String>,
    pub config: JobConfig,
}

impl Job {
    /// Creates a job from any list of URL strings
    pub fn new<I, S>(urls: I, config: JobConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Tracks when the job may issue its next request
#[derive(Debug, Clone)]
pub struct Pacer {
    delay: Duration,
    last_issued: Option<Instant>,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_issued: None,
        }
    }

    /// Time left before the next request may be issued
    ///
    /// Returns None when a request may be issued right away.
    pub fn time_until_ready(&self, now: Instant) -> Option<Duration> {
        let ready_at = self.last_issued? + self.delay;
        if now >= ready_at {
            None
        } else {
            Some(ready_at - now)
        }
    }

    /// Waits out the politeness delay, then marks a request as issued
    ///
    /// Called once per request attempt, so retries are paced too.
    pub async fn wait_turn(&mut self) {
        if let Some(wait) = self.time_until_ready(Instant::now()) {
            tracing::trace!("Waiting {:?} before next request", wait);
            tokio::time::sleep(wait).await;
        }
        self.last_issued = Some(Instant::now());
    }
}

/// Runs jobs against a shared HTTP client
///
/// The scheduler holds no per-job state, so one instance can run several
/// jobs concurrently; each job gets its own [`Pacer`].
#[derive(Debug, Clone)]
pub struct Scheduler {
    client: Client,
}

impl Scheduler {
    /// Creates a scheduler around an HTTP client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Runs a job, producing one record per URL in submission order
    ///
    /// The returned stream is lazy: a URL is only fetched when the consumer
    /// polls for its record, and records are yielded as soon as they are
    /// built. Failures become records with a failure status and never end
    /// the stream early. Dropping the stream stops the job; nothing is
    /// fetched ahead of the consumer.
    ///
    /// URLs that are not absolute http(s) URLs yield an
    /// [`ScrapeStatus::InvalidUrl`] record without issuing a request, so
    /// they do not consume a delay slot. Retries of a URL wait out the
    /// delay like any other request.
    pub fn run(&self, job: Job) -> BoxStream<'static, Record> {
        let client = self.client.clone();
        let Job { urls, config } = job;
        let options = config.fetch_options();

        stream! {
            let mut pacer = Pacer::new(config.delay);
            let total = urls.len();

            for (index, raw_url) in urls.into_iter().enumerate() {
                let identity = match normalize_url(&raw_url) {
                    Ok(identity) => identity,
                    Err(e) => {
                        tracing::warn!("Skipping invalid URL {:?}: {}", raw_url, e);
                        yield Record::failure(raw_url.trim(), ScrapeStatus::InvalidUrl, None, Utc::now());
                        continue;
                    }
                };

                tracing::debug!("Fetching {}/{}: {}", index + 1, total, raw_url);

                let result = fetch_url(&client, &raw_url, &options, &mut pacer).await;
                let record = record_from_fetch(identity.as_str(), result, Utc::now());

                tracing::debug!("{} -> {}", record.url, record.status);
                yield record;
            }
        }
        .boxed()
    }
}

/// Converts a fetch outcome into a record for the given normalized URL
///
/// `fetched_at` should be taken when the fetch completed.
pub fn record_from_fetch(url: &str, result: FetchResult, fetched_at: DateTime<Utc>) -> Record {
    match result {
        FetchResult::Fetched {
            http_code, body, ..
        } => extract(url, &body, http_code, fetched_at),
        FetchResult::HttpError { http_code, error } => {
            tracing::warn!("HTTP error for {}: {}", url, error);
            Record::failure(url, ScrapeStatus::HttpError, http_code, fetched_at)
        }
        FetchResult::Timeout { error } => {
            tracing::warn!("Timeout for {}: {}", url, error);
            Record::failure(url, ScrapeStatus::Timeout, None, fetched_at)
        }
        FetchResult::InvalidUrl { error } => {
            tracing::warn!("Invalid URL {}: {}", url, error);
            Record::failure(url, ScrapeStatus::InvalidUrl, None, fetched_at)
        }
    }
}
