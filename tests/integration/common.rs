//! Shared fixtures

use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use template_scraper::config::{parse_config, Config};
use template_scraper::crawler::{CancelFlag, RunObserver};
use template_scraper::output::{Batch, BatchWriter, FlushSummary, OutputResult};

/// Observer that keeps every progress line
#[derive(Default)]
pub struct Recorder {
    pub lines: Mutex<Vec<String>>,
    pub cancel: CancelFlag,
}

impl Recorder {
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().unwrap().iter().any(|line| line.contains(needle))
    }
}

impl RunObserver for Recorder {
    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn progress(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}

/// Writer that only remembers batch sizes
#[derive(Clone, Default)]
pub struct CountingWriter {
    pub flushed: Arc<Mutex<Vec<usize>>>,
}

impl BatchWriter for CountingWriter {
    fn reset(&mut self) -> OutputResult<()> {
        Ok(())
    }

    fn flush(&mut self, batch: &Batch) -> OutputResult<FlushSummary> {
        self.flushed.lock().unwrap().push(batch.len());
        Ok(FlushSummary {
            items_written: batch.len(),
            text_files: 0,
        })
    }

    fn target(&self) -> &Path {
        Path::new("memory")
    }
}

/// Writes the template and URL list into `dir` and builds a run config
pub fn write_run(
    dir: &TempDir,
    mode: &str,
    template: &str,
    urls: &[String],
    extra_fetch: &str,
) -> Config {
    let template_path = dir.path().join("template.json");
    let urls_path = dir.path().join("urls.txt");
    std::fs::write(&template_path, template).unwrap();
    std::fs::write(&urls_path, urls.join("\n")).unwrap();

    let toml = format!(
        r#"
[run]
name = "test"
output-dir = '{}'
mode = "{}"
template = '{}'
urls = '{}'

[fetch]
backend = "http"
min-delay = 0.0
max-delay = 0.0
max-attempts = 1
timeout-secs = 5
rotate-user-agent = false
{}
"#,
        dir.path().join("out").display(),
        mode,
        template_path.display(),
        urls_path.display(),
        extra_fetch
    );
    parse_config(&toml).unwrap()
}

pub fn html_page(body: &str) -> String {
    format!("<html><head><title>t</title></head><body>{}</body></html>", body)
}
