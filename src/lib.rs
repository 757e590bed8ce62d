//! Template Scraper: batch extraction of structured data from web pages
//!
//! This crate fetches a list of URLs with either a plain HTTP client or a
//! scripted headless browser, extracts content according to a JSON selector
//! template, and persists the results in checkpointed batches.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod fetch;
pub mod output;
pub mod robots;
pub mod selector;
pub mod state;
pub mod template;

use thiserror::Error;

/// Main error type for scraper operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] fetch::FetchError),

    #[error("Action script error: {0}")]
    Script(#[from] fetch::script::ScriptError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::UrlState,
        to: state::UrlState,
    },

    #[error("Backend aborted the run: {0}")]
    BackendAborted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Backend '{0}' is not compiled into this build")]
    UnsupportedBackend(String),
}

/// Template-specific errors
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Failed to read template file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON in template: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template is missing the \"selectors\" object")]
    MissingSelectors,

    #[error("Selector for category '{category}' must be a string")]
    NonStringSelector { category: String },

    #[error("Invalid template: {0}")]
    Invalid(String),
}

/// Result type alias for scraper operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for template operations
pub type TemplateResult<T> = std::result::Result<T, TemplateError>;

// Re-export commonly used types
pub use config::{Backend, Config, OutputMode};
pub use extract::{Extractor, FieldValue, Record};
pub use state::UrlState;
pub use template::Template;
