//! Per-origin robots.txt cache

use super::RobotsPolicy;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Policy for one origin and when it was retrieved
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub policy: RobotsPolicy,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(policy: RobotsPolicy) -> Self {
        Self {
            policy,
            fetched_at: Utc::now(),
        }
    }

    /// Entries older than a day are fetched again on long runs
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }
}

/// Origin (`scheme://host:port`) → policy
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: HashMap<String, CachedRobots>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the fresh policy for `origin`, if any
    pub fn get(&self, origin: &str) -> Option<&RobotsPolicy> {
        self.entries
            .get(origin)
            .filter(|entry| !entry.is_stale())
            .map(|entry| &entry.policy)
    }

    pub fn insert(&mut self, origin: String, policy: RobotsPolicy) {
        self.entries.insert(origin, CachedRobots::new(policy));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
