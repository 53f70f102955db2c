//! Page Harvest: a polite page scraper with durable, deduplicated storage
//!
//! This crate fetches a list of URLs at a fixed politeness delay, extracts
//! title, body text and metadata from each page, upserts the resulting
//! records into SQLite keyed by normalized URL, and turns the stored records
//! into CSV/JSON exports and summary statistics.

pub mod config;
pub mod crawler;
pub mod output;
pub mod record;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Page Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// The store rejected or failed a write; the record was not persisted
    #[error("Storage unavailable while persisting {url}: {source}")]
    StorageUnavailable {
        url: String,
        source: storage::StorageError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Export error: {0}")]
    Export(#[from] output::ExportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Page Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{harvest, Job, JobConfig, JobReport, Scheduler};
pub use output::{export, summarize, ExportFormat, Stats};
pub use record::{Record, ScrapeStatus};
pub use storage::{RecordStore, SqliteStore};
pub use url::normalize_url;
