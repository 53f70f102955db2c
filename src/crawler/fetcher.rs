//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the scraper, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests with a per-attempt timeout
//! - The per-status retry policy
//! - Error classification into record statuses

use crate::config::UserAgentConfig;
use crate::crawler::scheduler::Pacer;
use crate::url::parse_fetchable;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Maximum number of redirects followed for a single request
const MAX_REDIRECTS: usize = 10;

/// Per-request limits applied by [`fetch_url`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchOptions {
    /// Timeout for each individual attempt
    pub timeout: Duration,

    /// Extra attempts after a transient failure
    pub max_retries: u32,

    /// Fixed pause after a failed attempt, on top of the job's pacing
    pub retry_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 2,
            retry_delay: Duration::ZERO,
        }
    }
}

/// Result of a fetch operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// A 2xx response was received in full
    Fetched {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        http_code: u16,
        /// Content-Type header value
        content_type: Option<String>,
        /// Raw response body
        body: Vec<u8>,
    },

    /// A non-2xx response, or a transport failure that was not a timeout
    HttpError {
        /// The status code, when a response was received
        http_code: Option<u16>,
        /// Error description
        error: String,
    },

    /// The final attempt timed out
    Timeout {
        /// Error description
        error: String,
    },

    /// The URL is not an absolute http(s) URL; nothing was sent
    InvalidUrl {
        /// Error description
        error: String,
    },
}

impl FetchResult {
    /// The HTTP status code of the response, if one was received
    pub fn http_code(&self) -> Option<u16> {
        match self {
            Self::Fetched { http_code, .. } => Some(*http_code),
            Self::HttpError { http_code, .. } => *http_code,
            Self::Timeout { .. } | Self::InvalidUrl { .. } => None,
        }
    }
}

/// Outcome of a single attempt
enum Attempt {
    /// Final answer, never retried
    Done(FetchResult),
    /// Transient failure, retried while budget remains
    Retryable(FetchResult),
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use page_harvest::config::UserAgentConfig;
/// use page_harvest::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "PageHarvest".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(format_user_agent(config))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Formats the user agent as `CrawlerName/Version (+ContactURL; ContactEmail)`
pub fn format_user_agent(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Fetches a URL with validation, timeout and retry handling
///
/// Never returns an error: every failure is classified into a
/// [`FetchResult`] variant.
///
/// Every attempt, retries included, first waits for its turn on `pacer`, so
/// the job's politeness delay separates all requests it issues. An invalid
/// URL returns before touching the pacer.
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Not an absolute http(s) URL | Immediate → InvalidUrl, no request |
/// | HTTP 2xx | Immediate → Fetched |
/// | HTTP 4xx | Immediate → HttpError |
/// | HTTP 5xx | Retry up to `max_retries` → HttpError |
/// | Other non-2xx (3xx left after redirects) | Immediate → HttpError |
/// | Timeout | Retry up to `max_retries` → Timeout |
/// | Connection refused, DNS, other transport | Retry up to `max_retries` → HttpError |
/// | Redirect limit exceeded | Immediate → HttpError |
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
/// * `options` - Timeout and retry budget
/// * `pacer` - The job's request pacing
pub async fn fetch_url(
    client: &Client,
    url: &str,
    options: &FetchOptions,
    pacer: &mut Pacer,
) -> FetchResult {
    let target = match parse_fetchable(url) {
        Ok(target) => target,
        Err(e) => {
            tracing::debug!("Refusing to fetch {}: {}", url, e);
            return FetchResult::InvalidUrl {
                error: e.to_string(),
            };
        }
    };

    let mut attempt = 0;
    loop {
        pacer.wait_turn().await;
        match fetch_once(client, &target, options.timeout).await {
            Attempt::Done(result) => return result,
            Attempt::Retryable(result) => {
                if attempt >= options.max_retries {
                    tracing::warn!(
                        "Giving up on {} after {} attempt(s): {:?}",
                        target,
                        attempt + 1,
                        result
                    );
                    return result;
                }

                attempt += 1;
                tracing::debug!(
                    "Retrying {} (retry {}/{}) after {:?}",
                    target,
                    attempt,
                    options.max_retries,
                    result
                );

                if !options.retry_delay.is_zero() {
                    tokio::time::sleep(options.retry_delay).await;
                }
            }
        }
    }
}

/// Performs a single GET and classifies the outcome
async fn fetch_once(client: &Client, url: &Url, timeout: Duration) -> Attempt {
    let response = match client.get(url.clone()).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) => return classify_transport_error(&e),
    };

    let status = response.status();
    let http_code = status.as_u16();

    if status.is_server_error() {
        return Attempt::Retryable(FetchResult::HttpError {
            http_code: Some(http_code),
            error: format!("Server error {}", status),
        });
    }

    if !status.is_success() {
        return Attempt::Done(FetchResult::HttpError {
            http_code: Some(http_code),
            error: describe_status(status),
        });
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    match response.bytes().await {
        Ok(body) => Attempt::Done(FetchResult::Fetched {
            final_url,
            http_code,
            content_type,
            body: body.to_vec(),
        }),
        Err(e) => classify_transport_error(&e),
    }
}

/// Maps a transport-level error onto the retry policy
fn classify_transport_error(e: &reqwest::Error) -> Attempt {
    if e.is_timeout() {
        return Attempt::Retryable(FetchResult::Timeout {
            error: "Request timeout".to_string(),
        });
    }

    if e.is_redirect() {
        return Attempt::Done(FetchResult::HttpError {
            http_code: e.status().map(|s| s.as_u16()),
            error: format!("Redirect error: {}", e),
        });
    }

    let error = if e.is_connect() {
        format!("Connection failed: {}", e)
    } else {
        e.to_string()
    };

    Attempt::Retryable(FetchResult::HttpError {
        http_code: None,
        error,
    })
}

fn describe_status(status: StatusCode) -> String {
    if status.is_client_error() {
        format!("Client error {}", status)
    } else {
        format!("Unexpected status {}", status)
    }
}
