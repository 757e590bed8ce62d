//! Configuration module
//!
//! This module handles loading, parsing, and validating the TOML run
//! configuration.
//!
//! # Example
//!
//! ```no_run
//! use template_scraper::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("run.toml")).unwrap();
//! println!("Writing {} output for run {}", config.run.mode, config.run.name);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Backend, BrowserSettings, Config, FetchConfig, OutputMode, RunConfig, MAX_DELAY_SECS,
};

// Re-export parser functions
pub use parser::{compute_file_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
