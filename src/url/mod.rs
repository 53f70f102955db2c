//! URL handling module for Page Harvest
//!
//! This module provides the identity rule for records (URL normalization),
//! validation of fetchable URLs, and host extraction for analytics.

mod normalize;

use crate::UrlError;
use url::Url;

pub use normalize::normalize_url;

/// Parses a URL that is eligible for fetching
///
/// Only absolute `http` and `https` URLs with a host are accepted. This is
/// the check the fetcher performs before it touches the network.
///
/// # Examples
///
/// ```
/// use page_harvest::url::parse_fetchable;
///
/// assert!(parse_fetchable("https://example.com/page").is_ok());
/// assert!(parse_fetchable("ftp://example.com/file").is_err());
/// assert!(parse_fetchable("/relative/path").is_err());
/// ```
pub fn parse_fetchable(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlError::MissingDomain),
    }
}

/// Extracts the lowercase host from a URL string
///
/// Returns None when the string does not parse or has no host.
///
/// # Examples
///
/// ```
/// use page_harvest::url::extract_domain;
///
/// assert_eq!(extract_domain("https://Blog.Example.com:8080/post"), Some("blog.example.com".to_string()));
/// assert_eq!(extract_domain("not a url"), None);
/// ```
pub fn extract_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()?
        .host_str()
        .map(|h| h.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetchable_accepts_http_and_https() {
        assert!(parse_fetchable("http://example.com/").is_ok());
        assert!(parse_fetchable("https://example.com/a?b=c").is_ok());
    }

    #[test]
    fn test_parse_fetchable_trims_whitespace() {
        let url = parse_fetchable("  https://example.com/page \n").unwrap();
        assert_eq!(url.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_parse_fetchable_rejects_other_schemes() {
        assert!(matches!(
            parse_fetchable("mailto:someone@example.com"),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(matches!(
            parse_fetchable("file:///etc/passwd"),
            Err(UrlError::InvalidScheme(_))
        ));
    }

    #[test]
    fn test_parse_fetchable_rejects_relative() {
        assert!(matches!(parse_fetchable("page.html"), Err(UrlError::Parse(_))));
        assert!(parse_fetchable("").is_err());
    }

    #[test]
    fn test_extract_domain_lowercases() {
        assert_eq!(
            extract_domain("https://EXAMPLE.com/Path"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn test_extract_domain_keeps_subdomain() {
        assert_eq!(
            extract_domain("https://api.v2.example.com/endpoint"),
            Some("api.v2.example.com".to_string())
        );
    }

    #[test]
    fn test_extract_domain_ignores_port_and_query() {
        assert_eq!(
            extract_domain("http://example.com:8080/page?query=value#frag"),
            Some("example.com".to_string())
        );
    }
}
