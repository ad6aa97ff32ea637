//! douban-top250 main entry point
//!
//! This is the command-line interface for the Top 250 crawler.

use clap::Parser;
use douban_top250::config::{apply_env_overrides, load_config_with_hash, validate, Config};
use douban_top250::crawler::Coordinator;
use douban_top250::output::export_records;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing_subscriber::EnvFilter;

/// douban-top250: a polite crawler for the Douban Movie Top 250
///
/// Warms up a browser-like session, fetches each listing page in order with
/// randomized pacing and retries, and writes the extracted movies as CSV,
/// plain text and JSON.
#[derive(Parser, Debug)]
#[command(name = "douban-top250")]
#[command(version = "1.0.0")]
#[command(about = "A polite crawler for the Douban Movie Top 250", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the number of pages to fetch
    #[arg(long, value_name = "N")]
    pages: Option<u32>,

    /// Validate config and show the pages that would be fetched, without any network access
    #[arg(long)]
    dry_run: bool,

    /// Crawl without writing any output files
    #[arg(long, conflicts_with = "dry_run")]
    no_export: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match prepare_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(config)?;
    } else {
        handle_crawl(config, !cli.no_export).await?;
    }

    Ok(())
}

/// Loads, overrides and validates the configuration for this run
fn prepare_config(cli: &Cli) -> douban_top250::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (cfg, hash) = load_config_with_hash(path)?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    apply_env_overrides(&mut config);
    if let Some(pages) = cli.pages {
        config.crawler.page_count = pages;
    }
    validate(&config)?;

    Ok(config)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("douban_top250=info,warn"),
            1 => EnvFilter::new("douban_top250=debug,info"),
            2 => EnvFilter::new("douban_top250=trace,debug"),
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

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: Config) -> douban_top250::Result<()> {
    println!("=== douban-top250 Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Base URL: {}", config.crawler.base_url);
    println!("  Page size: {}", config.crawler.page_size);
    println!("  Page count: {}", config.crawler.page_count);
    println!("  Inter-page delay: {}ms", config.crawler.inter_page_delay_ms);

    println!("\nRequests:");
    println!("  Attempt budget: {}", config.request.attempt_budget);
    println!("  Timeout: {}s", config.request.timeout_secs);
    let first = config.request.first_attempt_pause;
    let retry = config.request.retry_pause;
    println!("  First attempt pause: {}-{}ms", first.min_ms, first.max_ms);
    println!("  Retry pause: {}-{}ms", retry.min_ms, retry.max_ms);

    println!("\nSession:");
    println!(
        "  Credential cookie: {}",
        if config.session.cookie.is_some() {
            "configured"
        } else {
            "none"
        }
    );
    println!("  Warm-up URLs ({}):", config.session.warmup_urls.len());
    for url in &config.session.warmup_urls {
        println!("    * {}", url);
    }

    println!("\nOutput:");
    println!("  CSV: {}", config.output.csv_path);
    println!("  Text: {}", config.output.text_path);
    println!("  JSON: {}", config.output.json_path);

    let page_count = config.crawler.page_count;
    let coordinator = Coordinator::new(config)?;
    println!("\nPages:");
    for page in 0..page_count {
        println!("  {:>3}. {}", page + 1, coordinator.page_url(page));
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, export: bool) -> douban_top250::Result<()> {
    tracing::info!(
        "Starting crawl of {} ({} pages of {})",
        config.crawler.base_url,
        config.crawler.page_count,
        config.crawler.page_size
    );

    let output = config.output.clone();
    let mut coordinator = Coordinator::new(config)?;

    // Ctrl-C finishes the current page and stops before the next one
    let shutdown = coordinator.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current page");
            shutdown.store(true, Ordering::SeqCst);
        }
    });

    let records = coordinator.run().await;

    if records.is_empty() {
        println!("No records were extracted. Check the credential cookie and network access.");
        return Ok(());
    }

    if export {
        let written = export_records(&records, &output)?;
        for path in written {
            println!("✓ Saved {}", path.display());
        }
    } else {
        tracing::info!("Export disabled, {} records discarded", records.len());
    }

    Ok(())
}
