//! Record model for scraped pages
//!
//! A [`Record`] is the single canonical shape of one scraped page. It is
//! built transiently from one fetch result, handed to the store, and never
//! mutated in place afterwards; any update is a full replacement keyed by
//! the normalized URL.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Outcome of scraping a single URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScrapeStatus {
    /// Page was fetched with a 2xx response and its body decoded as text
    Success,

    /// A response with a non-2xx status was received, or the transport
    /// failed for a reason other than a timeout
    HttpError,

    /// Every attempt timed out
    Timeout,

    /// A 2xx body was empty or not valid UTF-8
    ParseError,

    /// The URL was not an absolute http(s) URL; no request was issued
    InvalidUrl,
}

impl ScrapeStatus {
    /// Returns true if this represents a successful scrape
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if records with this status are eligible for the store
    ///
    /// Invalid URLs have no normalized identity and are never persisted.
    pub fn is_persistable(&self) -> bool {
        !matches!(self, Self::InvalidUrl)
    }

    /// Converts the status to its stable string label
    ///
    /// The same label is used in the database, in CSV exports and in JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::HttpError => "HTTP_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::ParseError => "PARSE_ERROR",
            Self::InvalidUrl => "INVALID_URL",
        }
    }

    /// Parses a status from its string label
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "SUCCESS" => Some(Self::Success),
            "HTTP_ERROR" => Some(Self::HttpError),
            "TIMEOUT" => Some(Self::Timeout),
            "PARSE_ERROR" => Some(Self::ParseError),
            "INVALID_URL" => Some(Self::InvalidUrl),
            _ => None,
        }
    }

    /// Returns all statuses
    pub fn all_statuses() -> Vec<Self> {
        vec![
            Self::Success,
            Self::HttpError,
            Self::Timeout,
            Self::ParseError,
            Self::InvalidUrl,
        ]
    }
}

impl fmt::Display for ScrapeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Violations of the record invariants
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordViolation {
    #[error("successful record for {0} has no text")]
    MissingText(String),

    #[error("successful record for {url} has http code {code:?} outside 2xx")]
    NonSuccessCode { url: String, code: Option<u16> },

    #[error("failed record for {0} carries text")]
    UnexpectedText(String),
}

/// One scraped page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Normalized URL; the identity key in the store
    pub url: String,

    pub status: ScrapeStatus,

    pub title: Option<String>,

    /// Extracted body text; present (possibly empty) exactly when the
    /// status is [`ScrapeStatus::Success`]
    pub text: Option<String>,

    /// Page metadata such as description, keywords or language
    pub metadata: BTreeMap<String, String>,

    /// When the fetch completed
    pub fetched_at: DateTime<Utc>,

    /// HTTP status code, when a response was received
    pub http_code: Option<u16>,
}

impl Record {
    /// Builds a successful record
    pub fn success(
        url: impl Into<String>,
        title: Option<String>,
        text: String,
        metadata: BTreeMap<String, String>,
        http_code: u16,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            url: url.into(),
            status: ScrapeStatus::Success,
            title,
            text: Some(text),
            metadata,
            fetched_at,
            http_code: Some(http_code),
        }
    }

    /// Builds a failed record; text, title and metadata are absent
    pub fn failure(
        url: impl Into<String>,
        status: ScrapeStatus,
        http_code: Option<u16>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            url: url.into(),
            status,
            title: None,
            text: None,
            metadata: BTreeMap::new(),
            fetched_at,
            http_code,
        }
    }

    /// Checks the status/text/http_code invariants
    pub fn check_invariants(&self) -> Result<(), RecordViolation> {
        if self.status.is_success() {
            if self.text.is_none() {
                return Err(RecordViolation::MissingText(self.url.clone()));
            }
            match self.http_code {
                Some(code) if (200..=299).contains(&code) => {}
                code => {
                    return Err(RecordViolation::NonSuccessCode {
                        url: self.url.clone(),
                        code,
                    })
                }
            }
        } else if self.text.is_some() {
            return Err(RecordViolation::UnexpectedText(self.url.clone()));
        }

        Ok(())
    }

    /// Character length of the extracted text (0 when absent)
    pub fn text_length(&self) -> usize {
        self.text.as_deref().map(|t| t.chars().count()).unwrap_or(0)
    }
}

/// Formats a timestamp as fixed-width RFC 3339 with nanoseconds
///
/// The fixed width keeps lexicographic and chronological order identical,
/// which the store relies on when comparing `fetched_at` in SQL.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parses an RFC 3339 timestamp into UTC
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|ts| ts.with_timezone(&Utc))
}
