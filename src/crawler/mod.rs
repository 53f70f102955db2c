//! Crawler module for fetching pages and turning them into records
//!
//! This module contains the scraping pipeline, including:
//! - HTTP fetching with per-status retry logic
//! - HTML extraction of title, text and metadata
//! - Request pacing for a job
//! - Harvest orchestration into the store

mod extractor;
mod fetcher;
mod pipeline;
mod scheduler;

pub use extractor::{extract, extract_text, parse_html, ParsedPage};
pub use fetcher::{build_http_client, fetch_url, format_user_agent, FetchOptions, FetchResult};
pub use pipeline::{harvest, run_harvest, JobReport};
pub use scheduler::{record_from_fetch, Job, JobConfig, Pacer, Scheduler};
