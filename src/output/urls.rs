//! Newline-delimited link output

use super::traits::{remove_if_exists, Batch, BatchWriter, FlushSummary, OutputError, OutputResult};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writer for the `urls_only` mode
///
/// Links are deduplicated within one batch only; earlier batches are never
/// re-read.
pub struct UrlListWriter {
    path: PathBuf,
}

impl UrlListWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Stable dedup: keeps the first occurrence of every link
pub fn dedup_links(links: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    links
        .iter()
        .map(String::as_str)
        .filter(|link| seen.insert(*link))
        .collect()
}

impl BatchWriter for UrlListWriter {
    fn reset(&mut self) -> OutputResult<()> {
        remove_if_exists(&self.path)
    }

    fn flush(&mut self, batch: &Batch) -> OutputResult<FlushSummary> {
        let Batch::Links(links) = batch else {
            return Err(OutputError::BatchMismatch {
                writer: "URL list writer",
                batch: batch.kind(),
            });
        };
        if links.is_empty() {
            return Ok(FlushSummary::default());
        }

        let unique = dedup_links(links);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut chunk = String::new();
        if file.metadata()?.len() > 0 {
            chunk.push('\n');
        }
        chunk.push_str(&unique.join("\n"));
        file.write_all(chunk.as_bytes())?;

        debug!("Appended {} links to {}", unique.len(), self.path.display());
        Ok(FlushSummary {
            items_written: unique.len(),
            text_files: 0,
        })
    }

    fn target(&self) -> &Path {
        &self.path
    }
}
