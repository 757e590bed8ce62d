//! Crawl orchestration
//!
//! The orchestrator walks the URL list once, in order. Every URL ends as
//! records in the batch (or, for link harvesting, as links plus an error log
//! line) and the batch is flushed at fixed checkpoints, so a crash or a
//! cancellation loses at most one checkpoint interval.

use crate::crawler::delay::DelayRange;
use crate::crawler::input::UrlEntry;
use crate::crawler::RunObserver;
use crate::extract::{detect_captcha, document_text, Extractor, Record};
use crate::fetch::{FetchBackend, PageSnapshot};
use crate::output::{Batch, BatchWriter, ErrorLog, RunStats};
use crate::robots::{RobotsChecker, DISALLOWED_REASON};
use crate::state::{UrlLifecycle, UrlState};
use crate::ScrapeError;
use scraper::Html;
use std::time::Instant;
use url::Url;

/// Default number of URLs between checkpoints
pub const DEFAULT_CHECKPOINT_EVERY: usize = 100;

/// How one URL ended
enum UrlOutcome {
    Extracted(Vec<Record>),
    Failed { error: String, robots: bool },
    /// The backend is gone; the run cannot continue
    Fatal(String),
}

/// Main orchestrator structure
pub struct Orchestrator {
    backend: Box<dyn FetchBackend>,
    extractor: Extractor,
    writer: Box<dyn BatchWriter>,
    error_log: ErrorLog,
    robots: Option<RobotsChecker>,
    delay: DelayRange,
    checkpoint_every: usize,
    batch: Batch,
    stats: RunStats,
}

impl Orchestrator {
    /// Creates an orchestrator without robots checks or delays
    pub fn new(
        backend: Box<dyn FetchBackend>,
        extractor: Extractor,
        writer: Box<dyn BatchWriter>,
        error_log: ErrorLog,
    ) -> Self {
        let batch = Batch::for_mode(extractor.mode());
        Self {
            backend,
            extractor,
            writer,
            error_log,
            robots: None,
            delay: DelayRange::none(),
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            batch,
            stats: RunStats::default(),
        }
    }

    pub fn with_robots(mut self, robots: RobotsChecker) -> Self {
        self.robots = Some(robots);
        self
    }

    pub fn with_delay(mut self, delay: DelayRange) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_checkpoint_every(mut self, checkpoint_every: usize) -> Self {
        self.checkpoint_every = checkpoint_every.max(1);
        self
    }

    /// Statistics so far; complete after `run` returns, even with an error
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Runs the main loop over `entries`
    ///
    /// Returns `BackendAborted` when the backend fails fatally. Everything
    /// processed before that point has been flushed.
    pub async fn run(
        &mut self,
        entries: &[UrlEntry],
        observer: &dyn RunObserver,
    ) -> Result<RunStats, ScrapeError> {
        let started = Instant::now();
        let total = entries.len();
        tracing::info!(
            "Starting run over {} URLs with the {} backend",
            total,
            self.backend.name()
        );

        let mut aborted = None;

        for (position, entry) in entries.iter().enumerate() {
            if observer.is_cancelled() {
                observer.progress("Scraping cancelled by user.");
                self.stats.cancelled = true;
                break;
            }

            let idx = position + 1;
            let fatal = self.process_entry(idx, total, entry, observer).await;

            if let Some(reason) = fatal {
                observer.progress(&format!(
                    "CRITICAL: {} backend is unresponsive. Aborting run.",
                    self.backend.name()
                ));
                aborted = Some(reason);
                break;
            }

            if idx % self.checkpoint_every == 0 || idx == total {
                self.checkpoint(idx, total, observer);
            }

            if idx < total && !observer.is_cancelled() {
                self.delay.wait().await;
            }
        }

        if self.stats.cancelled || aborted.is_some() {
            self.checkpoint(self.stats.processed as usize, total, observer);
        }

        self.backend.shutdown().await;
        self.stats.elapsed = started.elapsed();

        tracing::info!(
            "Run finished: {} processed, {} succeeded, {} failed in {:?}",
            self.stats.processed,
            self.stats.succeeded,
            self.stats.failed,
            self.stats.elapsed
        );

        match aborted {
            Some(reason) => {
                self.stats.aborted = true;
                Err(ScrapeError::BackendAborted(reason))
            }
            None => Ok(self.stats.clone()),
        }
    }

    /// Processes one list entry; returns the reason if the backend died
    async fn process_entry(
        &mut self,
        idx: usize,
        total: usize,
        entry: &UrlEntry,
        observer: &dyn RunObserver,
    ) -> Option<String> {
        self.stats.processed += 1;

        let url = match entry {
            UrlEntry::Valid(url) => url,
            UrlEntry::Invalid { raw, reason } => {
                self.record_failure(idx, total, raw, reason, observer);
                return None;
            }
        };

        let mut lifecycle = UrlLifecycle::new();
        let outcome = match self.process_url(idx, total, url, &mut lifecycle, observer).await {
            Ok(outcome) => outcome,
            Err(e) => UrlOutcome::Failed {
                error: e.to_string(),
                robots: false,
            },
        };

        let classified = match outcome {
            UrlOutcome::Extracted(records) => {
                let count = records.len();
                for record in records {
                    self.batch.push(record);
                }
                self.stats.succeeded += 1;
                observer.progress(&format!(
                    "[{}/{}] {} scraped ({} items found)",
                    idx, total, url, count
                ));
                lifecycle.advance(UrlState::Succeeded)
            }
            UrlOutcome::Failed { error, robots } => {
                if robots {
                    self.stats.robots_blocked += 1;
                }
                self.record_failure(idx, total, url.as_str(), &error, observer);
                lifecycle.advance(UrlState::Failed)
            }
            UrlOutcome::Fatal(reason) => {
                self.record_failure(idx, total, url.as_str(), &reason, observer);
                return Some(reason);
            }
        };

        if let Err(e) = classified.and_then(|()| lifecycle.advance(UrlState::Buffered)) {
            tracing::error!("{}: {}", url, e);
        }
        None
    }

    async fn process_url(
        &mut self,
        idx: usize,
        total: usize,
        url: &Url,
        lifecycle: &mut UrlLifecycle,
        observer: &dyn RunObserver,
    ) -> Result<UrlOutcome, ScrapeError> {
        if let Some(robots) = self.robots.as_mut() {
            lifecycle.advance(UrlState::RobotsCheck)?;
            if !robots.is_allowed(url).await {
                observer.progress(&format!(
                    "[{}/{}] Skipped {}: disallowed by robots.txt",
                    idx, total, url
                ));
                return Ok(UrlOutcome::Failed {
                    error: DISALLOWED_REASON.to_string(),
                    robots: true,
                });
            }
        }

        lifecycle.advance(UrlState::Fetching)?;
        observer.progress(&format!("[{}/{}] Fetching {}...", idx, total, url));
        let snapshots = match self.backend.fetch(url, observer).await {
            Ok(snapshots) => snapshots,
            Err(e) if e.is_fatal() => return Ok(UrlOutcome::Fatal(e.to_string())),
            Err(e) => {
                return Ok(UrlOutcome::Failed {
                    error: e.to_string(),
                    robots: false,
                })
            }
        };

        lifecycle.advance(UrlState::Extracting)?;
        let mut records = Vec::with_capacity(snapshots.len());
        for snapshot in &snapshots {
            let (record, captcha) = self.extract_snapshot(snapshot);
            if captcha {
                self.stats.captcha_warnings += 1;
                observer.progress(&format!(
                    "[{}/{}] {} looks like a CAPTCHA page",
                    idx, total, snapshot.final_url
                ));
            }
            records.push(record);
        }
        Ok(UrlOutcome::Extracted(records))
    }

    /// Parses and extracts one snapshot; the document never crosses an await
    fn extract_snapshot(&self, snapshot: &PageSnapshot) -> (Record, bool) {
        let mut document = Html::parse_document(&snapshot.html);
        let captcha = detect_captcha(&document_text(&document));
        let record = self
            .extractor
            .extract_document(&mut document, &snapshot.final_url);
        (record, captcha)
    }

    fn record_failure(
        &mut self,
        idx: usize,
        total: usize,
        url: &str,
        error: &str,
        observer: &dyn RunObserver,
    ) {
        self.stats.failed += 1;
        observer.progress(&format!("[{}/{}] {} error: {}", idx, total, url, error));
        if let Err(e) = self.error_log.append(url, error) {
            tracing::error!(
                "Failed to write to error log {}: {}",
                self.error_log.path().display(),
                e
            );
        }
        self.batch.push(Record::failed(url, error));
    }

    /// Flushes the batch; failures are reported and the run goes on
    fn checkpoint(&mut self, idx: usize, total: usize, observer: &dyn RunObserver) {
        if self.batch.is_empty() {
            return;
        }

        observer.progress(&format!("Saving batch... (up to URL {}/{})", idx, total));
        match self.writer.flush(&self.batch) {
            Ok(summary) => {
                self.stats.flushes += 1;
                observer.progress(&format!(
                    "Batch of {} items saved to {}",
                    summary.items_written,
                    self.writer.target().display()
                ));
            }
            Err(e) => {
                self.stats.flush_failures += 1;
                tracing::error!("Failed to save batch: {}", e);
                observer.progress(&format!("CRITICAL: Failed to save batch! {}", e));
            }
        }
        self.batch.clear();
    }
}
