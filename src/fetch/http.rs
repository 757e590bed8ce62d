//! Plain HTTP backend

use super::retry::{classify_status, classify_transport, FailureKind, RetryDecision, RetryPolicy};
use super::{FetchBackend, FetchError, PageSnapshot};
use crate::config::FetchConfig;
use crate::crawler::RunObserver;
use crate::extract::has_visible_text;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Browser identity used when rotation is disabled
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";

/// Identities picked from when rotation is enabled
pub const USER_AGENTS: &[&str] = &[
    DEFAULT_USER_AGENT,
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 \
     (KHTML, like Gecko) Version/16.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36",
];

const ACCEPT_VALUE: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE_VALUE: &str = "pl-PL,pl;q=0.9,en-US;q=0.8,en;q=0.7";
const REFERER_VALUE: &str = "https://www.google.com/";

/// Chooses the identity for one run
pub fn choose_user_agent(rotate: bool) -> &'static str {
    if rotate {
        USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(DEFAULT_USER_AGENT)
    } else {
        DEFAULT_USER_AGENT
    }
}

/// Builds the HTTP client shared by page and robots.txt requests
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));
    headers.insert(REFERER, HeaderValue::from_static(REFERER_VALUE));

    Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// One failed attempt
struct AttemptFailure {
    kind: FailureKind,
    error: FetchError,
}

/// Fetches pages with one reqwest client per run
pub struct HttpBackend {
    client: Client,
    user_agent: String,
    retry: RetryPolicy,
}

impl HttpBackend {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let user_agent = choose_user_agent(config.rotate_user_agent).to_string();
        let client = build_http_client(&user_agent, Duration::from_secs(config.timeout_secs))?;
        debug!("HTTP backend using identity: {}", user_agent);
        Ok(Self {
            client,
            user_agent,
            retry: RetryPolicy::with_max_attempts(config.max_attempts),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    async fn attempt(&self, url: &Url) -> Result<PageSnapshot, AttemptFailure> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(transport_failure)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptFailure {
                kind: classify_status(status.as_u16()),
                error: FetchError::Status {
                    status: status.as_u16(),
                },
            });
        }

        let final_url = response.url().clone();
        let html = response.text().await.map_err(transport_failure)?;

        if !has_visible_text(&html) {
            return Err(AttemptFailure {
                kind: FailureKind::EmptyContent,
                error: FetchError::EmptyContent { attempts: 1 },
            });
        }

        Ok(PageSnapshot { final_url, html })
    }
}

fn transport_failure(error: reqwest::Error) -> AttemptFailure {
    let kind = classify_transport(&error);
    let error = if error.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(error.to_string())
    };
    AttemptFailure { kind, error }
}

#[async_trait]
impl FetchBackend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(
        &mut self,
        url: &Url,
        observer: &dyn RunObserver,
    ) -> Result<Vec<PageSnapshot>, FetchError> {
        let mut attempt = 1;
        loop {
            let failure = match self.attempt(url).await {
                Ok(snapshot) => return Ok(vec![snapshot]),
                Err(failure) => failure,
            };

            match self.retry.should_retry(failure.kind, attempt) {
                RetryDecision::Retry { delay, attempt: next } => {
                    let line = match failure.kind {
                        FailureKind::EmptyContent => {
                            format!("Empty content on attempt {}, retrying...", attempt)
                        }
                        _ => format!("Request error on attempt {}: {}", attempt, failure.error),
                    };
                    observer.progress(&line);
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::GiveUp { reason } => {
                    warn!("Giving up on {} ({}): {}", url, reason, failure.error);
                    return Err(match failure.kind {
                        FailureKind::Permanent => failure.error,
                        FailureKind::EmptyContent => FetchError::EmptyContent { attempts: attempt },
                        FailureKind::Transient => FetchError::Exhausted {
                            attempts: attempt,
                            last: failure.error.to_string(),
                        },
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_identity_without_rotation() {
        assert_eq!(choose_user_agent(false), DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_rotation_picks_known_identity() {
        for _ in 0..10 {
            assert!(USER_AGENTS.contains(&choose_user_agent(true)));
        }
    }

    #[test]
    fn test_user_agents_are_single_line() {
        for ua in USER_AGENTS {
            assert!(!ua.contains('\n'));
            assert!(!ua.contains("  "));
        }
    }

    #[test]
    fn test_build_client() {
        assert!(build_http_client(DEFAULT_USER_AGENT, Duration::from_secs(15)).is_ok());
    }
}
