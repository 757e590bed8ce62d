//! Fetch backends
//!
//! A backend turns a URL into one or more page snapshots (final URL plus
//! markup). Extraction happens in the orchestrator, so the plain HTTP client
//! and the scripted browser feed the same extractor.

#[cfg(feature = "browser")]
pub mod browser;
pub mod http;
pub mod retry;
pub mod script;

pub use http::HttpBackend;
pub use retry::{FailureKind, RetryDecision, RetryPolicy};

use crate::crawler::RunObserver;
use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Markup of a page at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub final_url: Url,
    pub html: String,
}

/// Errors produced while fetching a single URL
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP status {status}")]
    Status { status: u16 },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("page had no visible content after {attempts} attempt(s)")]
    EmptyContent { attempts: u32 },

    #[error("failed after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("page processing failed: {0}")]
    Page(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// The backend can no longer process any URL
    #[error("backend is unusable: {0}")]
    Fatal(String),
}

impl FetchError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// A strategy for obtaining page content
#[async_trait]
pub trait FetchBackend: Send {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Fetches `url`, returning every snapshot that should be extracted
    async fn fetch(
        &mut self,
        url: &Url,
        observer: &dyn RunObserver,
    ) -> Result<Vec<PageSnapshot>, FetchError>;

    /// Releases backend resources at the end of a run
    async fn shutdown(&mut self) {}
}
