//! Output module for exports, statistics and reports
//!
//! This module handles:
//! - Exporting stored records as CSV or JSON (and reading them back)
//! - Aggregating records into summary statistics
//! - Rendering a markdown report of the statistics and latest session

mod exporter;
mod markdown;
pub mod stats;

pub use exporter::{export, export_to_path, read_csv, read_json, write_atomically, ExportFormat};
pub use markdown::{format_report, write_report};
pub use stats::{print_statistics, summarize, Stats, SummaryOptions, TextLengthRange, TimeRange};

use thiserror::Error;

/// Errors that can occur while exporting or re-importing records
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid export data: {0}")]
    Format(String),
}

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;
