//! robots.txt compliance
//!
//! Policies are fetched once per origin and cached for the run. Any failure
//! to retrieve robots.txt (DNS, connection, timeout, server error) allows the
//! URL.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::{product_token, RobotsPolicy};

use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

/// Error reason recorded for URLs blocked by robots.txt
pub const DISALLOWED_REASON: &str = "Disallowed by robots.txt";

/// Answers "may this URL be fetched?" for one run
pub struct RobotsChecker {
    client: Client,
    product_token: String,
    cache: RobotsCache,
}

impl RobotsChecker {
    /// `user_agent` is the full identity; rules are matched on its product token
    pub fn new(client: Client, user_agent: &str) -> Self {
        Self {
            client,
            product_token: product_token(user_agent).to_string(),
            cache: RobotsCache::new(),
        }
    }

    pub async fn is_allowed(&mut self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();
        if let Some(policy) = self.cache.get(&origin) {
            return policy.is_allowed(url.as_str(), &self.product_token);
        }

        let policy = self.fetch_policy(url).await;
        let allowed = policy.is_allowed(url.as_str(), &self.product_token);
        self.cache.insert(origin, policy);
        allowed
    }

    async fn fetch_policy(&self, url: &Url) -> RobotsPolicy {
        let robots_url = match url.join("/robots.txt") {
            Ok(robots_url) => robots_url,
            Err(_) => return RobotsPolicy::AllowAll,
        };

        let response = match self.client.get(robots_url.as_str()).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Could not fetch {} ({}), allowing", robots_url, e);
                return RobotsPolicy::AllowAll;
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Could not read {} ({}), allowing", robots_url, e);
                return RobotsPolicy::AllowAll;
            }
        };
        debug!("Fetched {} (HTTP {})", robots_url, status);
        RobotsPolicy::from_response(status, &body)
    }

    pub fn cached_origins(&self) -> usize {
        self.cache.len()
    }
}
