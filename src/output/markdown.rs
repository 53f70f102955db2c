//! Markdown report generation
//!
//! This module renders [`Stats`] and the latest harvest session as a
//! human-readable markdown report.

use crate::output::write_atomically;
use crate::output::{ExportResult, Stats};
use crate::record::ScrapeStatus;
use crate::storage::SessionRecord;
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::Path;

/// How many top words the report lists
const REPORT_TOP_WORDS: usize = 25;

/// Writes the markdown report to `output_path`, replacing it atomically
pub fn write_report(
    stats: &Stats,
    latest_session: Option<&SessionRecord>,
    output_path: &Path,
) -> ExportResult<()> {
    let markdown = format_report(stats, latest_session, Utc::now());

    write_atomically(output_path, |writer| {
        writer.write_all(markdown.as_bytes())?;
        Ok(())
    })
}

/// Formats statistics and the latest session as markdown
pub fn format_report(
    stats: &Stats,
    latest_session: Option<&SessionRecord>,
    generated_at: DateTime<Utc>,
) -> String {
    let mut md = String::new();

    md.push_str("# Page Harvest Report\n\n");
    md.push_str(&format!("_Generated {}_\n\n", generated_at.to_rfc3339()));

    // General statistics
    md.push_str("## General Statistics\n\n");
    md.push_str(&format!("- **Total Records**: {}\n", stats.total_records));
    md.push_str(&format!(
        "- **Successful**: {}\n",
        stats
            .count_by_status
            .get(&ScrapeStatus::Success)
            .copied()
            .unwrap_or(0)
    ));
    md.push_str(&format!("- **Success Rate**: {:.2}%\n", stats.success_rate));
    md.push_str(&format!("- **Unique Domains**: {}\n", stats.unique_domains));
    if let Some(range) = &stats.time_range {
        md.push_str(&format!("- **First Fetch**: {}\n", range.start.to_rfc3339()));
        md.push_str(&format!("- **Last Fetch**: {}\n", range.end.to_rfc3339()));
    }
    md.push('\n');

    // Status breakdown
    if !stats.count_by_status.is_empty() {
        md.push_str("## Status Breakdown\n\n");
        md.push_str("| Status | Count |\n");
        md.push_str("|--------|-------|\n");
        for (status, count) in &stats.count_by_status {
            md.push_str(&format!("| {} | {} |\n", status, count));
        }
        md.push('\n');
    }

    // Content
    md.push_str("## Content Statistics\n\n");
    md.push_str(&format!(
        "- **Average Text Length**: {:.0} characters\n",
        stats.avg_text_length
    ));
    if let Some(range) = &stats.text_length {
        md.push_str(&format!("- **Longest Text**: {} characters\n", range.max));
        md.push_str(&format!("- **Shortest Text**: {} characters\n", range.min));
    }
    md.push('\n');

    if !stats.top_domains.is_empty() {
        md.push_str("## Top Domains\n\n");
        md.push_str("| Domain | Pages |\n");
        md.push_str("|--------|-------|\n");
        for (domain, count) in &stats.top_domains {
            md.push_str(&format!("| {} | {} |\n", domain, count));
        }
        md.push('\n');
    }

    if !stats.top_words.is_empty() {
        md.push_str("## Most Common Words\n\n");
        md.push_str("| Word | Occurrences |\n");
        md.push_str("|------|-------------|\n");
        for (word, count) in stats.top_words.iter().take(REPORT_TOP_WORDS) {
            md.push_str(&format!("| {} | {} |\n", word, count));
        }
        md.push('\n');
    }

    // Latest session
    md.push_str("## Latest Harvest Session\n\n");
    match latest_session {
        Some(session) => {
            md.push_str(&format!("- **Session ID**: {}\n", session.session_id));
            md.push_str(&format!("- **Started**: {}\n", session.started_at.to_rfc3339()));
            md.push_str(&format!("- **Finished**: {}\n", session.finished_at.to_rfc3339()));
            md.push_str(&format!(
                "- **Duration**: {:.1} seconds\n",
                session.duration_seconds
            ));
            md.push_str(&format!(
                "- **URLs**: {} ({} successful, {} failed, {} skipped)\n",
                session.total_urls, session.successful, session.failed, session.skipped
            ));
            md.push_str(&format!(
                "- **Session Success Rate**: {:.2}%\n",
                session.success_rate()
            ));
            md.push_str(&format!("- **Config Hash**: {}\n", session.config_hash));
        }
        None => md.push_str("No harvest sessions recorded.\n"),
    }

    md
}
