//! Crawl orchestration
//!
//! This module contains the run-level logic:
//! - Loading the URL list
//! - Progress reporting and cancellation
//! - The per-URL loop with robots checks, delays and checkpoints
//! - Assembling a run from its configuration

mod coordinator;
mod delay;
mod input;
mod observer;

pub use coordinator::{Orchestrator, DEFAULT_CHECKPOINT_EVERY};
pub use delay::DelayRange;
pub use input::{load_url_list, parse_url_list, UrlEntry};
pub use observer::{CancelFlag, LogObserver, RunObserver};

use crate::config::{Backend, Config};
use crate::extract::Extractor;
use crate::fetch::{FetchBackend, HttpBackend};
use crate::output::{create_writer, ErrorLog, OutputPaths, RunStats};
use crate::robots::RobotsChecker;
use crate::template::Template;
use crate::{ConfigError, ScrapeError};
use reqwest::Client;

/// Runs a complete scrape
///
/// This is the main entry point for a run. It will:
/// 1. Load the template and the URL list
/// 2. Reset the output files of this run name
/// 3. Start the configured backend
/// 4. Process every URL and flush at checkpoints
///
/// # Example
///
/// ```no_run
/// use template_scraper::config::load_config;
/// use template_scraper::crawler::{run_scrape, CancelFlag, LogObserver};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("run.toml"))?;
/// let stats = run_scrape(&config, &LogObserver::new(CancelFlag::new())).await?;
/// println!("{} URLs processed", stats.processed);
/// # Ok(())
/// # }
/// ```
pub async fn run_scrape(
    config: &Config,
    observer: &dyn RunObserver,
) -> Result<RunStats, ScrapeError> {
    let template = Template::load(&config.run.template)?;
    let entries = load_url_list(&config.run.urls)?;
    if entries.is_empty() {
        return Err(ConfigError::Validation(format!(
            "URL list {} is empty",
            config.run.urls.display()
        ))
        .into());
    }

    let paths = OutputPaths::new(&config.run.output_dir, config.run.name.as_str());
    std::fs::create_dir_all(paths.dir())?;
    let mut writer = create_writer(config.run.mode, &paths, main_tags(config, &template));
    writer.reset()?;
    let error_log = ErrorLog::new(paths.error_log());
    error_log.reset()?;

    let (backend, robots_client, user_agent) = build_backend(config).await?;
    let extractor = Extractor::new(&template, config.run.mode);

    let mut orchestrator = Orchestrator::new(backend, extractor, writer, error_log)
        .with_delay(DelayRange::from_secs(
            config.fetch.min_delay,
            config.fetch.max_delay,
        ))
        .with_checkpoint_every(config.run.checkpoint_every);
    if config.fetch.respect_robots {
        orchestrator = orchestrator.with_robots(RobotsChecker::new(robots_client, &user_agent));
    }

    orchestrator.run(&entries, observer).await
}

/// Categories written to the per-record text files
///
/// Defaults to every normal category in template order. Unknown names are
/// kept (they produce no text) but warned about.
pub fn main_tags(config: &Config, template: &Template) -> Vec<String> {
    if config.run.main_tags.is_empty() {
        return template.category_names();
    }
    for tag in &config.run.main_tags {
        if !template.has_category(tag) {
            tracing::warn!("main-tags entry '{}' is not a template category", tag);
        }
    }
    config.run.main_tags.clone()
}

/// Starts the configured backend
///
/// Also returns the client and identity used for robots.txt requests, so the
/// rules are matched against the identity pages are fetched with.
async fn build_backend(
    config: &Config,
) -> Result<(Box<dyn FetchBackend>, Client, String), ScrapeError> {
    match config.fetch.backend {
        Backend::Http => {
            let backend = HttpBackend::new(&config.fetch)?;
            let client = backend.client().clone();
            let user_agent = backend.user_agent().to_string();
            Ok((Box::new(backend), client, user_agent))
        }
        Backend::Browser => build_browser_backend(config).await,
    }
}

#[cfg(feature = "browser")]
async fn build_browser_backend(
    config: &Config,
) -> Result<(Box<dyn FetchBackend>, Client, String), ScrapeError> {
    use crate::fetch::browser::BrowserBackend;
    use crate::fetch::http::{build_http_client, DEFAULT_USER_AGENT};
    use crate::fetch::script::ActionScript;
    use std::time::Duration;

    let script = match &config.browser.script {
        Some(path) => Some(ActionScript::load(path)?),
        None => None,
    };
    let backend = BrowserBackend::launch(&config.browser, script).await?;
    let client = build_http_client(
        DEFAULT_USER_AGENT,
        Duration::from_secs(config.fetch.timeout_secs),
    )?;
    Ok((Box::new(backend), client, DEFAULT_USER_AGENT.to_string()))
}

#[cfg(not(feature = "browser"))]
async fn build_browser_backend(
    _config: &Config,
) -> Result<(Box<dyn FetchBackend>, Client, String), ScrapeError> {
    Err(ConfigError::UnsupportedBackend(Backend::Browser.to_string()).into())
}
