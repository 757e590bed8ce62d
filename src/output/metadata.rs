//! `text_metadata` output: raw JSON, a metadata table and one text file per
//! record
//!
//! Text files are numbered across the whole run. A batch continues from the
//! number of rows already in the table, so error rows consume no file number
//! of their own but shift later ones the same way the table does.

use super::json::append_records;
use super::traits::{remove_if_exists, temp_path, Batch, BatchWriter, FlushSummary, OutputError, OutputResult};
use crate::extract::{FieldValue, Record};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// First column of the table
pub const FILE_NAME_COLUMN: &str = "file_name";

/// File name recorded for error rows
pub const ERROR_FILE_NAME: &str = "ERROR";

/// In-memory copy of the metadata table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl MetadataTable {
    /// Loads the table, or an empty one when the file is missing or unreadable
    pub fn load(path: &Path) -> Self {
        match fs::metadata(path) {
            Ok(meta) if meta.len() > 0 => {}
            Ok(_) => return Self::default(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Self::default(),
            Err(_) => {}
        }
        match Self::read(path) {
            Ok(table) => table,
            Err(e) => {
                warn!("Could not read {} ({}), starting a new table", path.display(), e);
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> OutputResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)?;
        let columns = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for row in reader.records() {
            rows.push(row?.iter().map(str::to_string).collect());
        }
        Ok(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Value of `column` in row `index`
    pub fn cell(&self, index: usize, column: &str) -> Option<&str> {
        let position = self.columns.iter().position(|c| c == column)?;
        self.rows
            .get(index)
            .map(|row| row.get(position).map(String::as_str).unwrap_or(""))
    }

    /// Appends a row given as ordered `(column, value)` pairs
    ///
    /// Unknown columns are added at the end; rows written earlier get an empty
    /// cell for them.
    pub fn push(&mut self, cells: Vec<(String, String)>) {
        let mut row = vec![String::new(); self.columns.len()];
        for (column, value) in cells {
            match self.columns.iter().position(|c| *c == column) {
                Some(position) => row[position] = value,
                None => {
                    self.columns.push(column);
                    row.push(value);
                }
            }
        }
        self.rows.push(row);
    }

    /// Moves `file_name` then `url` to the front
    fn reorder(&mut self) {
        for column in ["url", FILE_NAME_COLUMN] {
            let Some(position) = self.columns.iter().position(|c| c == column) else {
                continue;
            };
            let name = self.columns.remove(position);
            self.columns.insert(0, name);
            for row in &mut self.rows {
                row.resize(self.columns.len(), String::new());
                let value = row.remove(position);
                row.insert(0, value);
            }
        }
    }

    fn save(&mut self, path: &Path) -> OutputResult<()> {
        self.reorder();
        let tmp = temp_path(path);
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            writer.write_record(&self.columns)?;
            for row in &self.rows {
                let mut padded = row.clone();
                padded.resize(self.columns.len(), String::new());
                writer.write_record(&padded)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Table cell for a category value
///
/// Lists are stored as JSON arrays so they survive the round trip through
/// the table.
fn cell_text(value: &FieldValue) -> String {
    match value {
        FieldValue::Missing => String::new(),
        FieldValue::Single(text) => text.clone(),
        FieldValue::Many(texts) => serde_json::to_string(texts).unwrap_or_default(),
    }
}

/// Main-tag text of one record: lists flattened, parts separated by a blank line
pub fn merged_text(record: &Record, main_tags: &[String]) -> String {
    main_tags
        .iter()
        .filter_map(|tag| record.field(tag))
        .flat_map(|value| value.parts())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Writer for the `text_metadata` mode
pub struct MetadataWriter {
    dir: PathBuf,
    json_path: PathBuf,
    table_path: PathBuf,
    main_tags: Vec<String>,
}

impl MetadataWriter {
    /// `main_tags` are the categories concatenated into each text file, in order
    pub fn new(dir: impl Into<PathBuf>, main_tags: Vec<String>) -> Self {
        let dir = dir.into();
        Self {
            json_path: dir.join("scraped_data.json"),
            table_path: dir.join("metadata.csv"),
            dir,
            main_tags,
        }
    }

    pub fn table_path(&self) -> &Path {
        &self.table_path
    }

    pub fn json_path(&self) -> &Path {
        &self.json_path
    }
}

impl BatchWriter for MetadataWriter {
    fn reset(&mut self) -> OutputResult<()> {
        fs::create_dir_all(&self.dir)?;
        remove_if_exists(&self.json_path)?;
        remove_if_exists(&self.table_path)
    }

    fn flush(&mut self, batch: &Batch) -> OutputResult<FlushSummary> {
        let Batch::Records(records) = batch else {
            return Err(OutputError::BatchMismatch {
                writer: "metadata writer",
                batch: batch.kind(),
            });
        };
        if records.is_empty() {
            return Ok(FlushSummary::default());
        }

        fs::create_dir_all(&self.dir)?;
        let items_written = append_records(&self.json_path, records)?;

        let mut table = MetadataTable::load(&self.table_path);
        let first_index = table.row_count();
        let mut text_files = 0;

        for (offset, record) in records.iter().enumerate() {
            match record {
                Record::Extracted { url, fields } => {
                    let file_name = format!("{}.txt", first_index + offset + 1);
                    fs::write(self.dir.join(&file_name), merged_text(record, &self.main_tags))?;
                    text_files += 1;

                    let mut cells = vec![
                        (FILE_NAME_COLUMN.to_string(), file_name),
                        ("url".to_string(), url.clone()),
                    ];
                    cells.extend(
                        fields
                            .iter()
                            .map(|(name, value)| (name.clone(), cell_text(value))),
                    );
                    table.push(cells);
                }
                Record::Failed { url, error } => table.push(vec![
                    (FILE_NAME_COLUMN.to_string(), ERROR_FILE_NAME.to_string()),
                    ("url".to_string(), url.clone()),
                    ("error".to_string(), error.clone()),
                ]),
                Record::Links { url, urls } => table.push(vec![
                    (FILE_NAME_COLUMN.to_string(), String::new()),
                    ("url".to_string(), url.clone()),
                    ("urls".to_string(), serde_json::to_string(urls)?),
                ]),
            }
        }

        table.save(&self.table_path)?;
        debug!(
            "Wrote {} text files and {} metadata rows to {}",
            text_files,
            records.len(),
            self.dir.display()
        );

        Ok(FlushSummary {
            items_written,
            text_files,
        })
    }

    fn target(&self) -> &Path {
        &self.dir
    }
}
