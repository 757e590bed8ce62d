//! JSON array output
//!
//! The whole array is re-read, extended and rewritten on every flush. The new
//! content goes to a temporary sibling first and is renamed over the old file,
//! so a failed write leaves the previous array intact.

use super::traits::{remove_if_exists, temp_path, Batch, BatchWriter, FlushSummary, OutputError, OutputResult};
use crate::extract::Record;
use serde_json::Value;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Appends records to a JSON array file
pub fn append_records(path: &Path, records: &[Record]) -> OutputResult<usize> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut items = read_array(path)?;
    for record in records {
        items.push(serde_json::to_value(record)?);
    }
    write_atomically(path, &items)?;

    debug!("Appended {} records to {}", records.len(), path.display());
    Ok(records.len())
}

/// Reads the existing array
///
/// A missing or empty file is an empty array. So is a file that does not
/// hold a JSON array; that case is warned about and the file is overwritten
/// by the next write.
pub fn read_array(path: &Path) -> OutputResult<Vec<Value>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(_) => {
            warn!("{} is not a JSON array, overwriting", path.display());
            Ok(Vec::new())
        }
        Err(e) => {
            warn!("Corrupted JSON file {} ({}), overwriting", path.display(), e);
            Ok(Vec::new())
        }
    }
}

fn write_atomically(path: &Path, items: &[Value]) -> OutputResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    let result = (|| -> OutputResult<()> {
        let mut writer = BufWriter::new(fs::File::create(&tmp)?);
        serde_json::to_writer_pretty(&mut writer, items)?;
        writer.flush()?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            fs::rename(&tmp, path)?;
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

/// Writer for the `text_only` mode
pub struct JsonWriter {
    path: PathBuf,
}

impl JsonWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BatchWriter for JsonWriter {
    fn reset(&mut self) -> OutputResult<()> {
        remove_if_exists(&self.path)
    }

    fn flush(&mut self, batch: &Batch) -> OutputResult<FlushSummary> {
        let Batch::Records(records) = batch else {
            return Err(OutputError::BatchMismatch {
                writer: "JSON writer",
                batch: batch.kind(),
            });
        };
        let items_written = append_records(&self.path, records)?;
        Ok(FlushSummary {
            items_written,
            text_files: 0,
        })
    }

    fn target(&self) -> &Path {
        &self.path
    }
}
