use serde::Deserialize;

/// Main configuration structure for Page Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub job: JobEntry,
}

/// Pacing and retry behavior for a scrape job
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Minimum time between two requests of the same job (seconds)
    #[serde(rename = "delay-seconds", default = "default_delay_seconds")]
    pub delay_seconds: f64,

    /// Per-attempt request timeout (seconds)
    #[serde(rename = "timeout-seconds", default = "default_timeout_seconds")]
    pub timeout_seconds: f64,

    /// Extra attempts after a transient failure (timeout, transport error, 5xx)
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed pause before each retry (milliseconds)
    #[serde(rename = "retry-delay-ms", default)]
    pub retry_delay_ms: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            delay_seconds: default_delay_seconds(),
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            retry_delay_ms: 0,
        }
    }
}

fn default_delay_seconds() -> f64 {
    2.0
}

fn default_timeout_seconds() -> f64 {
    10.0
}

fn default_max_retries() -> u32 {
    2
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the scraper
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the scraper
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the scraper
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for scraper-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output locations
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    #[serde(rename = "csv-path", default = "default_csv_path")]
    pub csv_path: String,

    #[serde(rename = "json-path", default = "default_json_path")]
    pub json_path: String,

    /// Path to the markdown report
    #[serde(rename = "report-path", default = "default_report_path")]
    pub report_path: String,
}

fn default_csv_path() -> String {
    "scraped_data.csv".to_string()
}

fn default_json_path() -> String {
    "scraped_data.json".to_string()
}

fn default_report_path() -> String {
    "harvest_report.md".to_string()
}

/// Aggregation settings
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    /// Number of most frequent words to report
    #[serde(rename = "top-n", default = "default_top_n")]
    pub top_n: usize,

    /// Number of most scraped hosts to report
    #[serde(rename = "top-domains", default = "default_top_domains")]
    pub top_domains: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            top_domains: default_top_domains(),
        }
    }
}

fn default_top_n() -> usize {
    50
}

fn default_top_domains() -> usize {
    10
}

/// URLs scraped by the default CLI mode
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobEntry {
    #[serde(default)]
    pub urls: Vec<String>,
}
