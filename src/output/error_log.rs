//! Per-run log of failed URLs, one `url<TAB>message` line each

use super::traits::{remove_if_exists, OutputResult};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn reset(&self) -> OutputResult<()> {
        remove_if_exists(&self.path)
    }

    pub fn append(&self, url: &str, message: &str) -> OutputResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}\t{}", url, single_line(message))?;
        Ok(())
    }

    /// True if at least one failure was logged
    pub fn has_entries(&self) -> bool {
        fs::metadata(&self.path)
            .map(|meta| meta.len() > 0)
            .unwrap_or(false)
    }
}

fn single_line(message: &str) -> String {
    message.replace('\r', "").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_flattens_newlines() {
        let dir = TempDir::new().unwrap();
        let log = ErrorLog::new(dir.path().join("run_errors.txt"));
        assert!(!log.has_entries());

        log.append("https://a.com", "HTTP 500\r\nServer Error").unwrap();
        log.append("https://b.com", "Disallowed by robots.txt").unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            content,
            "https://a.com\tHTTP 500 Server Error\nhttps://b.com\tDisallowed by robots.txt\n"
        );
        assert!(log.has_entries());

        log.reset().unwrap();
        assert!(!log.has_entries());
    }
}
