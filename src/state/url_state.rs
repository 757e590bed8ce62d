//! Per-URL state definitions for the crawl loop

use crate::ScrapeError;
use std::fmt;

/// Represents the current state of one URL in the crawl loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlState {
    // ===== Active States =====
    /// Read from the URL list, not yet looked at
    Pending,

    /// Waiting on the robots.txt verdict for its origin
    RobotsCheck,

    /// Backend is fetching the page (retries stay in this state)
    Fetching,

    /// Snapshots are being run through the extractor
    Extracting,

    // ===== Classified States =====
    /// At least one record was extracted
    Succeeded,

    /// Produced an error record
    Failed,

    // ===== Terminal State =====
    /// Record handed to the batch
    Buffered,
}

impl UrlState {
    /// Returns true once the record sits in the batch
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Buffered)
    }

    /// Returns true while the URL is still being worked on
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::RobotsCheck | Self::Fetching | Self::Extracting
        )
    }

    /// Returns true for the two outcome states
    pub fn is_classified(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether the pipeline may move from `self` to `next`
    ///
    /// Every active state may fail. Robots checking is optional, so a pending
    /// URL may go straight to fetching.
    pub fn can_transition_to(&self, next: UrlState) -> bool {
        use UrlState::*;
        matches!(
            (self, next),
            (Pending, RobotsCheck)
                | (Pending, Fetching)
                | (RobotsCheck, Fetching)
                | (Fetching, Extracting)
                | (Extracting, Succeeded)
                | (Pending | RobotsCheck | Fetching | Extracting, Failed)
                | (Succeeded | Failed, Buffered)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::RobotsCheck => "robots_check",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Buffered => "buffered",
        }
    }

    /// Returns all possible URL states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::RobotsCheck,
            Self::Fetching,
            Self::Extracting,
            Self::Succeeded,
            Self::Failed,
            Self::Buffered,
        ]
    }
}

impl fmt::Display for UrlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks one URL through the pipeline with checked transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlLifecycle {
    state: UrlState,
}

impl UrlLifecycle {
    pub fn new() -> Self {
        Self {
            state: UrlState::Pending,
        }
    }

    pub fn state(&self) -> UrlState {
        self.state
    }

    pub fn advance(&mut self, next: UrlState) -> Result<(), ScrapeError> {
        if !self.state.can_transition_to(next) {
            return Err(ScrapeError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

impl Default for UrlLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
