//! URL list loading

use std::path::Path;
use url::Url;

const VIEW_SOURCE_PREFIX: &str = "view-source:";

/// One non-blank line of the URL list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlEntry {
    Valid(Url),
    /// Kept so the failure is reported like any other URL error
    Invalid { raw: String, reason: String },
}

impl UrlEntry {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Valid(url) => url.as_str(),
            Self::Invalid { raw, .. } => raw,
        }
    }
}

/// Parses a newline-delimited URL list
///
/// Lines are trimmed and blank ones skipped. A leading `view-source:` is
/// removed. Only http and https URLs are valid.
pub fn parse_url_list(content: &str) -> Vec<UrlEntry> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_entry)
        .collect()
}

pub fn load_url_list(path: &Path) -> std::io::Result<Vec<UrlEntry>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_url_list(&content))
}

fn parse_entry(line: &str) -> UrlEntry {
    let raw = line.strip_prefix(VIEW_SOURCE_PREFIX).unwrap_or(line).trim();
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => UrlEntry::Valid(url),
        Ok(url) => UrlEntry::Invalid {
            raw: raw.to_string(),
            reason: format!("Unsupported URL scheme '{}'", url.scheme()),
        },
        Err(e) => UrlEntry::Invalid {
            raw: raw.to_string(),
            reason: format!("Invalid URL: {}", e),
        },
    }
}
