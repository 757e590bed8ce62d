//! Politeness delay between URLs

use crate::config::MAX_DELAY_SECS;
use crate::fetch::retry::random_between;
use std::time::Duration;

/// Uniform random pause in `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    min: Duration,
    max: Duration,
}

impl DelayRange {
    /// Builds a range from seconds; bounds are clamped to `[0, MAX_DELAY_SECS]`
    pub fn from_secs(min: f64, max: f64) -> Self {
        let min = clamped_secs(min);
        let max = clamped_secs(max).max(min);
        Self { min, max }
    }

    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn sample(&self) -> Duration {
        random_between(self.min, self.max)
    }

    pub async fn wait(&self) {
        let pause = self.sample();
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
}

// NaN falls through `clamp` unchanged, so it is mapped to zero first
fn clamped_secs(secs: f64) -> Duration {
    let secs = if secs.is_nan() { 0.0 } else { secs };
    Duration::from_secs_f64(secs.clamp(0.0, MAX_DELAY_SECS))
}
