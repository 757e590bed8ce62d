//! Template Scraper main entry point
//!
//! This is the command-line interface for the template-driven batch scraper.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use template_scraper::config::{compute_file_hash, load_config_with_hash, validate, Config};
use template_scraper::crawler::{load_url_list, main_tags, run_scrape, CancelFlag, LogObserver, UrlEntry};
use template_scraper::output::{print_run_stats, OutputPaths};
use template_scraper::{ScrapeError, Template};
use tracing_subscriber::EnvFilter;

/// Template Scraper: batch extraction of structured data from web pages
///
/// Fetches every URL of a list with a plain HTTP client or a scripted
/// headless browser, extracts content with a JSON selector template, and
/// writes the results in checkpointed batches.
#[derive(Parser, Debug)]
#[command(name = "template-scraper")]
#[command(version = "1.0.0")]
#[command(about = "Template-driven batch web scraper", long_about = None)]
struct Cli {
    /// Path to TOML run configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config, template and URL list without fetching anything
    #[arg(long)]
    dry_run: bool,

    /// Override the run name (output file names derive from it)
    #[arg(long, value_name = "NAME")]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(name) = cli.name {
        config.run.name = name;
        validate(&config).context("invalid --name")?;
    }

    let template_hash = compute_file_hash(&config.run.template)
        .with_context(|| format!("failed to read template {}", config.run.template.display()))?;
    tracing::info!("Template: {} (hash: {})", config.run.template.display(), template_hash);

    if cli.dry_run {
        handle_dry_run(&config, &config_hash, &template_hash)
    } else {
        handle_scrape(config).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("template_scraper=info,warn"),
            1 => EnvFilter::new("template_scraper=debug,info"),
            2 => EnvFilter::new("template_scraper=trace,debug"),
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

/// Handles the --dry-run mode: validates inputs and shows what would be scraped
fn handle_dry_run(config: &Config, config_hash: &str, template_hash: &str) -> Result<()> {
    println!("=== Template Scraper Dry Run ===\n");

    println!("Run:");
    println!("  Name: {}", config.run.name);
    println!("  Mode: {}", config.run.mode);
    println!("  Checkpoint every: {} URLs", config.run.checkpoint_every);
    println!("  Config hash: {}", config_hash);

    println!("\nFetch:");
    println!("  Backend: {}", config.fetch.backend);
    println!(
        "  Delay: {:.1}-{:.1}s",
        config.fetch.min_delay, config.fetch.max_delay
    );
    println!("  Max attempts: {}", config.fetch.max_attempts);
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    println!("  Rotate user agent: {}", config.fetch.rotate_user_agent);
    println!("  Respect robots.txt: {}", config.fetch.respect_robots);
    if config.fetch.backend == template_scraper::Backend::Browser {
        println!("  Headless: {}", config.browser.headless);
        if let Some(path) = &config.browser.session_state {
            println!("  Session state: {}", path.display());
        }
        if let Some(path) = &config.browser.script {
            println!("  Action script: {}", path.display());
        }
    }

    let template = Template::load(&config.run.template)
        .with_context(|| format!("invalid template {}", config.run.template.display()))?;
    println!("\nTemplate: {}", config.run.template.display());
    println!("  Hash: {}", template_hash);
    for entry in template.entries() {
        let kind = if entry.is_exclusion() { "exclude" } else { "extract" };
        println!("  - [{}] {}: {}", kind, entry.category, entry.selector);
    }
    if config.run.mode == template_scraper::OutputMode::TextMetadata {
        println!("  Main tags: {}", main_tags(config, &template).join(", "));
    }

    let entries = load_url_list(&config.run.urls)
        .with_context(|| format!("failed to read URL list {}", config.run.urls.display()))?;
    let invalid: Vec<_> = entries
        .iter()
        .filter_map(|entry| match entry {
            UrlEntry::Invalid { raw, reason } => Some((raw, reason)),
            UrlEntry::Valid(_) => None,
        })
        .collect();
    println!("\nURLs: {} ({} invalid)", entries.len(), invalid.len());
    for (raw, reason) in &invalid {
        println!("  ! {}: {}", raw, reason);
    }

    let paths = OutputPaths::new(&config.run.output_dir, config.run.name.as_str());
    println!("\nOutput directory: {}", paths.dir().display());
    println!("  Error log: {}", paths.error_log().display());

    println!("\n✓ Configuration is valid");
    println!("✓ Would scrape {} URLs", entries.len() - invalid.len());

    Ok(())
}

/// Handles the main scrape operation
async fn handle_scrape(config: Config) -> Result<()> {
    let cancel = CancelFlag::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current URL");
            on_signal.cancel();
        }
    });

    tracing::info!(
        "Starting run '{}' ({} mode, {} backend)",
        config.run.name,
        config.run.mode,
        config.fetch.backend
    );

    let observer = LogObserver::new(cancel);
    let result = run_scrape(&config, &observer).await;

    let paths = OutputPaths::new(&config.run.output_dir, config.run.name.as_str());
    match result {
        Ok(stats) => {
            print_run_stats(&stats);
            if stats.failed > 0 {
                println!(
                    "\nSome URLs failed. See {} for details.",
                    paths.error_log().display()
                );
            }
            Ok(())
        }
        Err(ScrapeError::BackendAborted(reason)) => {
            tracing::error!("Run aborted: {}", reason);
            println!(
                "\nRun aborted; data scraped so far was saved. See {} for details.",
                paths.error_log().display()
            );
            Err(ScrapeError::BackendAborted(reason).into())
        }
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}
