use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Upper bound for `min-delay` and `max-delay` (seconds)
pub const MAX_DELAY_SECS: f64 = 3600.0;

/// Main configuration structure for one scrape run
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub run: RunConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub browser: BrowserSettings,
}

/// What to scrape and where to write it
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Run name; output file names are derived from it
    pub name: String,

    /// Root directory for all output files
    #[serde(rename = "output-dir", default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Output mode
    pub mode: OutputMode,

    /// Path to the JSON selector template
    pub template: PathBuf,

    /// Path to the newline-delimited URL list
    pub urls: PathBuf,

    /// Categories concatenated into the per-record text files (text_metadata only)
    #[serde(rename = "main-tags", default)]
    pub main_tags: Vec<String>,

    /// Number of processed URLs between batch flushes
    #[serde(rename = "checkpoint-every", default = "default_checkpoint_every")]
    pub checkpoint_every: usize,
}

/// Fetch behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Which fetch backend to use
    #[serde(default)]
    pub backend: Backend,

    /// Lower bound of the delay between URLs (seconds)
    #[serde(rename = "min-delay", default = "default_min_delay")]
    pub min_delay: f64,

    /// Upper bound of the delay between URLs (seconds)
    #[serde(rename = "max-delay", default = "default_max_delay")]
    pub max_delay: f64,

    /// Total attempts per URL, shared by transport and empty-content retries
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pick a random browser identity per run instead of the fixed default
    #[serde(rename = "rotate-user-agent", default = "default_true")]
    pub rotate_user_agent: bool,

    /// Check robots.txt before fetching each URL
    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,
}

/// Scripted browser settings (only read when `backend = "browser"`)
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSettings {
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Previously captured session state (cookies + local storage)
    #[serde(rename = "session-state", default)]
    pub session_state: Option<PathBuf>,

    /// Action script executed on every page before extraction
    #[serde(default)]
    pub script: Option<PathBuf>,

    /// Navigation and command timeout (milliseconds)
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Output shape of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// JSON array of records
    TextOnly,
    /// Newline-delimited harvested links
    UrlsOnly,
    /// Raw JSON plus a metadata table and one text file per record
    TextMetadata,
}

impl OutputMode {
    /// Returns true for the link-harvest mode
    pub fn is_link_harvest(&self) -> bool {
        matches!(self, Self::UrlsOnly)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextOnly => "text_only",
            Self::UrlsOnly => "urls_only",
            Self::TextMetadata => "text_metadata",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fetch backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Http,
    Browser,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("http"),
            Self::Browser => f.write_str("browser"),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            min_delay: default_min_delay(),
            max_delay: default_max_delay(),
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout_secs(),
            rotate_user_agent: true,
            respect_robots: true,
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            session_state: None,
            script: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_checkpoint_every() -> usize {
    100
}

fn default_min_delay() -> f64 {
    1.0
}

fn default_max_delay() -> f64 {
    3.0
}

fn default_max_attempts() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_true() -> bool {
    true
}
