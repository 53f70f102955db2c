use crate::config::types::{AnalyticsConfig, Config, OutputConfig, ScraperConfig, UserAgentConfig};
use crate::url::parse_fetchable;
use crate::ConfigError;
use url::Url;

/// Upper bound on retries so a dead host cannot stall a job indefinitely
const MAX_RETRIES_LIMIT: u32 = 10;

/// Upper bound, in seconds, for the delay and timeout settings
const MAX_DURATION_SECONDS: f64 = 86_400.0;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scraper_config(&config.scraper)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_analytics_config(&config.analytics)?;
    validate_job_urls(&config.job.urls)?;
    Ok(())
}

/// Validates pacing and retry settings
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if !config.delay_seconds.is_finite()
        || config.delay_seconds < 0.0
        || config.delay_seconds > MAX_DURATION_SECONDS
    {
        return Err(ConfigError::Validation(format!(
            "delay_seconds must be between 0 and {}, got {}",
            MAX_DURATION_SECONDS, config.delay_seconds
        )));
    }

    if !config.timeout_seconds.is_finite()
        || config.timeout_seconds <= 0.0
        || config.timeout_seconds > MAX_DURATION_SECONDS
    {
        return Err(ConfigError::Validation(format!(
            "timeout_seconds must be > 0 and <= {}, got {}",
            MAX_DURATION_SECONDS, config.timeout_seconds
        )));
    }

    if config.max_retries > MAX_RETRIES_LIMIT {
        return Err(ConfigError::Validation(format!(
            "max_retries must be <= {}, got {}",
            MAX_RETRIES_LIMIT, config.max_retries
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if config.crawler_version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "crawler_version cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output paths
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("database_path", &config.database_path),
        ("csv_path", &config.csv_path),
        ("json_path", &config.json_path),
        ("report_path", &config.report_path),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

fn validate_analytics_config(config: &AnalyticsConfig) -> Result<(), ConfigError> {
    if config.top_n < 1 {
        return Err(ConfigError::Validation(
            "top_n must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the URLs listed for the default job
fn validate_job_urls(urls: &[String]) -> Result<(), ConfigError> {
    for url in urls {
        parse_fetchable(url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid job URL '{}': {}", url, e)))?;
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let (local, domain) = email.split_once('@').ok_or_else(|| {
        ConfigError::Validation(format!("Invalid email format: '{}'", email))
    })?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
