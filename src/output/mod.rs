//! Batch persistence
//!
//! This module handles:
//! - Appending batches to the output file(s) of the chosen mode
//! - Logging failed URLs to the per-run error log
//! - Recording run statistics

mod error_log;
mod json;
mod metadata;
pub mod stats;
mod traits;
mod urls;

pub use error_log::ErrorLog;
pub use json::{append_records, read_array, JsonWriter};
pub use metadata::{merged_text, MetadataTable, MetadataWriter, ERROR_FILE_NAME, FILE_NAME_COLUMN};
pub use stats::{print_run_stats, RunStats};
pub use traits::{Batch, BatchWriter, FlushSummary, OutputError, OutputPaths, OutputResult};
pub use urls::{dedup_links, UrlListWriter};

use crate::config::OutputMode;

/// Creates the writer for `mode`
///
/// `main_tags` is only used by `text_metadata`.
pub fn create_writer(
    mode: OutputMode,
    paths: &OutputPaths,
    main_tags: Vec<String>,
) -> Box<dyn BatchWriter> {
    match mode {
        OutputMode::UrlsOnly => Box::new(UrlListWriter::new(paths.url_list())),
        OutputMode::TextOnly => Box::new(JsonWriter::new(paths.json())),
        OutputMode::TextMetadata => Box::new(MetadataWriter::new(paths.export_dir(), main_tags)),
    }
}
