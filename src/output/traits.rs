//! Batch writer trait and shared types
//!
//! A run buffers its outcomes in a [`Batch`] and hands it to one
//! [`BatchWriter`] at every checkpoint. Writers append; they never lose what
//! an earlier flush wrote.

use crate::config::OutputMode;
use crate::extract::Record;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{writer} cannot write a {batch} batch")]
    BatchMismatch {
        writer: &'static str,
        batch: &'static str,
    },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Outcomes buffered since the last checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Batch {
    /// Text modes: one record per URL, errors included
    Records(Vec<Record>),
    /// Link harvesting: the raw links of every successful page
    Links(Vec<String>),
}

impl Batch {
    pub fn for_mode(mode: OutputMode) -> Self {
        if mode.is_link_harvest() {
            Self::Links(Vec::new())
        } else {
            Self::Records(Vec::new())
        }
    }

    /// Adds one outcome
    ///
    /// A link batch only keeps harvested links; error records reach the
    /// error log instead.
    pub fn push(&mut self, record: Record) {
        match (self, record) {
            (Self::Records(records), record) => records.push(record),
            (Self::Links(links), Record::Links { urls, .. }) => links.extend(urls),
            (Self::Links(_), _) => {}
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Records(records) => records.len(),
            Self::Links(links) => links.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        match self {
            Self::Records(records) => records.clear(),
            Self::Links(links) => links.clear(),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Records(_) => "record",
            Self::Links(_) => "link",
        }
    }
}

/// What one flush wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    /// Records or links appended to the main output
    pub items_written: usize,
    /// Per-record text files created (metadata mode)
    pub text_files: usize,
}

/// Trait for batch persistence
pub trait BatchWriter: Send {
    /// Removes the output files of a previous run with the same name
    fn reset(&mut self) -> OutputResult<()>;

    /// Appends one batch to the output
    ///
    /// An empty batch is a no-op.
    fn flush(&mut self, batch: &Batch) -> OutputResult<FlushSummary>;

    /// The file or directory this writer produces
    fn target(&self) -> &Path;
}

/// File layout of one named run below the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    dir: PathBuf,
    name: String,
}

impl OutputPaths {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<name>.txt` (link harvesting)
    pub fn url_list(&self) -> PathBuf {
        self.dir.join(format!("{}.txt", self.name))
    }

    /// `<name>.json` (text only)
    pub fn json(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.name))
    }

    /// `<name>/` (text with metadata)
    pub fn export_dir(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    pub fn export_json(&self) -> PathBuf {
        self.export_dir().join("scraped_data.json")
    }

    pub fn metadata_table(&self) -> PathBuf {
        self.export_dir().join("metadata.csv")
    }

    /// `<name>_errors.txt`
    pub fn error_log(&self) -> PathBuf {
        self.dir.join(format!("{}_errors.txt", self.name))
    }
}

/// Removes `path` if it exists
pub(crate) fn remove_if_exists(path: &Path) -> OutputResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Sibling path used for write-then-rename
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
