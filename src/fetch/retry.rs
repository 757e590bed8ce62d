//! Retry policy shared by transport failures and empty-content pages
//!
//! Both kinds of retry draw from one attempt budget. Transient failures back
//! off exponentially (`base * 2^(n-1)`, capped, plus jitter); a page that
//! loaded but showed no text waits a random 2-5s pause instead.

use rand::Rng;
use std::time::Duration;
use tracing::debug;

/// Default number of attempts, including the first
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(16);
const MAX_JITTER: Duration = Duration::from_millis(500);
const CONTENT_DELAY_MIN: Duration = Duration::from_secs(2);
const CONTENT_DELAY_MAX: Duration = Duration::from_secs(5);

/// How a failed attempt should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 429, 5xx gateway errors, timeouts, dropped connections
    Transient,
    /// Successful response without visible text
    EmptyContent,
    /// Anything a retry would not fix
    Permanent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration, attempt: u32 },
    GiveUp { reason: String },
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    content_delay: (Duration, Duration),
    jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            content_delay: (CONTENT_DELAY_MIN, CONTENT_DELAY_MAX),
            jitter: MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// A policy that retries without sleeping
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            content_delay: (Duration::ZERO, Duration::ZERO),
            jitter: Duration::ZERO,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides what to do after `attempt` (1-indexed) failed with `kind`
    pub fn should_retry(&self, kind: FailureKind, attempt: u32) -> RetryDecision {
        if kind == FailureKind::Permanent {
            return RetryDecision::GiveUp {
                reason: "permanent failure".to_string(),
            };
        }
        if attempt >= self.max_attempts {
            return RetryDecision::GiveUp {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = match kind {
            FailureKind::EmptyContent => self.content_delay(),
            _ => self.backoff_delay(attempt),
        };
        debug!(attempt, delay_ms = delay.as_millis() as u64, ?kind, "will retry");

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);
        delay + random_between(Duration::ZERO, self.jitter)
    }

    fn content_delay(&self) -> Duration {
        random_between(self.content_delay.0, self.content_delay.1)
    }
}

/// Uniformly random duration in `[low, high]`
pub(crate) fn random_between(low: Duration, high: Duration) -> Duration {
    if high <= low {
        return low;
    }
    let ms = rand::thread_rng().gen_range(low.as_millis() as u64..=high.as_millis() as u64);
    Duration::from_millis(ms)
}

/// Classifies an HTTP status returned for a page request
pub fn classify_status(status: u16) -> FailureKind {
    match status {
        429 | 500 | 502 | 503 | 504 => FailureKind::Transient,
        _ => FailureKind::Permanent,
    }
}

/// Classifies a transport-level error from the HTTP client
pub fn classify_transport(error: &reqwest::Error) -> FailureKind {
    if error.is_builder() || error.is_redirect() {
        FailureKind::Permanent
    } else {
        FailureKind::Transient
    }
}
