//! Page Harvest main entry point
//!
//! This is the command-line interface for the Page Harvest scraper.

use anyhow::Context;
use clap::Parser;
use page_harvest::config::{load_config_with_hash, Config};
use page_harvest::crawler::{format_user_agent, run_harvest};
use page_harvest::output::{
    export_to_path, print_statistics, summarize, write_report, ExportFormat, SummaryOptions,
};
use page_harvest::storage::{RecordStore, SqliteStore};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Page Harvest: a polite page scraper
///
/// Page Harvest fetches a configured list of URLs at a fixed politeness
/// delay, stores one deduplicated record per page in SQLite, and exports
/// the stored records as CSV, JSON, statistics or a markdown report.
#[derive(Parser, Debug)]
#[command(name = "page-harvest")]
#[command(version)]
#[command(about = "A polite page scraper with durable storage", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be scraped without scraping
    #[arg(long, conflicts_with_all = ["stats", "export", "report"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export", "report"])]
    stats: bool,

    /// Export stored records to the configured CSV and JSON paths and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "report"])]
    export: bool,

    /// Write the markdown report from existing data and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export"])]
    report: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export {
        handle_export(&config)?;
    } else if cli.report {
        handle_report(&config)?;
    } else {
        handle_harvest(&config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("page_harvest=info,warn"),
            1 => EnvFilter::new("page_harvest=debug,info"),
            2 => EnvFilter::new("page_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_store(config: &Config) -> anyhow::Result<SqliteStore> {
    let path = Path::new(&config.output.database_path);
    SqliteStore::open(path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Handles the --dry-run mode: validates config and shows what would be scraped
fn handle_dry_run(config: &Config) {
    println!("=== Page Harvest Dry Run ===\n");

    println!("Scraper Configuration:");
    println!("  Delay between requests: {}s", config.scraper.delay_seconds);
    println!("  Request timeout: {}s", config.scraper.timeout_seconds);
    println!("  Max retries: {}", config.scraper.max_retries);
    println!("  Retry delay: {}ms", config.scraper.retry_delay_ms);

    println!("\nUser Agent:");
    println!("  {}", format_user_agent(&config.user_agent));

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  CSV: {}", config.output.csv_path);
    println!("  JSON: {}", config.output.json_path);
    println!("  Report: {}", config.output.report_path);

    println!("\nURLs ({}):", config.job.urls.len());
    for url in &config.job.urls {
        println!("  - {}", url);
    }

    let estimate = config.scraper.delay_seconds * config.job.urls.len().saturating_sub(1) as f64;
    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would scrape {} URLs (at least {:.0}s of politeness delay)",
        config.job.urls.len(),
        estimate
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_store(config)?;
    let snapshot = store.all()?;
    let stats = summarize(&snapshot, &SummaryOptions::from(&config.analytics));

    print_statistics(&stats);

    Ok(())
}

/// Handles the --export mode: writes CSV and JSON exports
fn handle_export(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let snapshot = store.all()?;
    tracing::info!(
        "Exporting snapshot of {} records taken at {}",
        snapshot.len(),
        snapshot.taken_at().to_rfc3339()
    );

    for (format, path) in [
        (ExportFormat::Csv, &config.output.csv_path),
        (ExportFormat::Json, &config.output.json_path),
    ] {
        export_to_path(snapshot.records(), format, Path::new(path))
            .with_context(|| format!("Failed to export {}", path))?;
        println!("✓ Exported {} records to: {}", snapshot.len(), path);
    }

    Ok(())
}

/// Handles the --report mode: writes the markdown report
fn handle_report(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config)?;

    tracing::info!("Loading records from database...");
    let snapshot = store.all()?;
    let stats = summarize(&snapshot, &SummaryOptions::from(&config.analytics));
    let latest_session = store.latest_session()?;

    let path = Path::new(&config.output.report_path);
    write_report(&stats, latest_session.as_ref(), path)
        .with_context(|| format!("Failed to write report {}", path.display()))?;

    println!("✓ Report written to: {}", path.display());

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: &Config, config_hash: &str) -> anyhow::Result<()> {
    tracing::info!(
        "Harvesting {} URLs into {}",
        config.job.urls.len(),
        config.output.database_path
    );

    match run_harvest(config, config_hash).await {
        Ok(report) => {
            println!(
                "✓ Harvest complete: {} successful, {} failed, {} skipped ({} stale) in {:.1}s",
                report.successful(),
                report.failed(),
                report.skipped,
                report.stale,
                report.duration_seconds()
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
