//! HTML extractor for turning response bodies into records
//!
//! This module handles parsing HTML content to extract:
//! - Page title
//! - Visible body text (script/style removed, whitespace collapsed)
//! - Metadata from `<meta>` tags and the document language

use crate::record::{Record, ScrapeStatus};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;

/// Elements whose contents never count as page text
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements that separate the text before and after them
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "caption", "dd", "details", "dialog",
    "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3",
    "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "option", "p", "pre",
    "section", "summary", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

/// `<meta name="...">` values copied into metadata under the same key
const META_NAMES: &[&str] = &["description", "keywords", "author"];

/// `<meta property="...">` values and the metadata key they map to
const META_PROPERTIES: &[(&str, &str)] = &[
    ("og:title", "og_title"),
    ("og:description", "og_description"),
];

/// Extracted information from an HTML page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Normalized body text
    pub text: String,

    /// Metadata recovered from the document head
    pub metadata: BTreeMap<String, String>,
}

/// Builds a record from a fetched response body
///
/// Markup is parsed best-effort: malformed HTML still yields a
/// [`ScrapeStatus::Success`] record with whatever could be recovered. The
/// record is a [`ScrapeStatus::ParseError`] only when the body is empty or
/// is not valid UTF-8.
///
/// # Arguments
///
/// * `url` - The normalized URL the body was fetched from
/// * `body` - Raw response body
/// * `http_code` - Status code of the 2xx response
/// * `fetched_at` - When the fetch completed
///
/// # Example
///
/// ```
/// use page_harvest::crawler::extract;
/// use page_harvest::ScrapeStatus;
///
/// let body = b"<title>Hi</title><p>hello   world</p>";
/// let record = extract("https://example.com/", body, 200, chrono::Utc::now());
/// assert_eq!(record.status, ScrapeStatus::Success);
/// assert_eq!(record.title.as_deref(), Some("Hi"));
/// assert_eq!(record.text.as_deref(), Some("hello world"));
/// ```
pub fn extract(url: &str, body: &[u8], http_code: u16, fetched_at: DateTime<Utc>) -> Record {
    if body.is_empty() {
        tracing::warn!("Empty body for {}", url);
        return Record::failure(url, ScrapeStatus::ParseError, Some(http_code), fetched_at);
    }

    let html = match std::str::from_utf8(body) {
        Ok(html) => html,
        Err(e) => {
            tracing::warn!("Body of {} is not valid UTF-8: {}", url, e);
            return Record::failure(url, ScrapeStatus::ParseError, Some(http_code), fetched_at);
        }
    };

    let parsed = parse_html(html);
    Record::success(
        url,
        parsed.title,
        parsed.text,
        parsed.metadata,
        http_code,
        fetched_at,
    )
}

/// Parses HTML content and extracts title, text and metadata
///
/// # Example
///
/// ```
/// use page_harvest::crawler::parse_html;
///
/// let html = r#"<html lang="en"><head><title>Test</title></head><body>Body</body></html>"#;
/// let parsed = parse_html(html);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.metadata.get("language").map(String::as_str), Some("en"));
/// ```
pub fn parse_html(html: &str) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        text: extract_document_text(&document),
        metadata: extract_metadata(&document),
    }
}

/// Extracts normalized body text from an HTML string
///
/// Applying this to identical markup always yields identical text.
pub fn extract_text(html: &str) -> String {
    extract_document_text(&Html::parse_document(html))
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn extract_document_text(document: &Html) -> String {
    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut text = String::new();
    collect_text(body, &mut text);
    collapse_whitespace(&text)
}

/// Walks an element's subtree appending text nodes, skipping non-visible elements
///
/// Inline markup adds nothing between text nodes; block elements are
/// surrounded by a space so adjacent blocks do not run together.
fn collect_text(element: ElementRef<'_>, text: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if SKIPPED_ELEMENTS.contains(&name) {
                continue;
            }

            let is_block = BLOCK_ELEMENTS.contains(&name);
            if is_block {
                text.push(' ');
            }
            collect_text(child_element, text);
            if is_block {
                text.push(' ');
            }
        } else if let Some(node_text) = child.value().as_text() {
            text.push_str(node_text);
        }
    }
}

/// Extracts description/keywords/author, Open Graph fields and language
fn extract_metadata(document: &Html) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();

    if let Ok(meta_selector) = Selector::parse("meta[content]") {
        for element in document.select(&meta_selector) {
            let attrs = element.value();
            let content = match attrs.attr("content").map(collapse_whitespace) {
                Some(content) if !content.is_empty() => content,
                _ => continue,
            };

            let key = attrs
                .attr("name")
                .map(|name| name.trim().to_lowercase())
                .and_then(|name| META_NAMES.iter().find(|k| **k == name).copied())
                .or_else(|| {
                    let property = attrs.attr("property")?.trim().to_lowercase();
                    META_PROPERTIES
                        .iter()
                        .find(|(p, _)| *p == property)
                        .map(|(_, key)| *key)
                });

            if let Some(key) = key {
                metadata.entry(key.to_string()).or_insert(content);
            }
        }
    }

    if let Ok(html_selector) = Selector::parse("html[lang]") {
        if let Some(lang) = document
            .select(&html_selector)
            .next()
            .and_then(|element| element.value().attr("lang"))
            .map(str::trim)
            .filter(|lang| !lang.is_empty())
        {
            metadata.insert("language".to_string(), lang.to_string());
        }
    }

    metadata
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
