//! Configuration module for Page Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use page_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Politeness delay: {}s", config.scraper.delay_seconds);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{AnalyticsConfig, Config, JobEntry, OutputConfig, ScraperConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
