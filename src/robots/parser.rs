//! robots.txt rule evaluation on top of the `robotstxt` matcher

use robotstxt::DefaultMatcher;

/// Access rules for one origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotsPolicy {
    /// No usable robots.txt: everything may be fetched
    AllowAll,
    /// The server refused access to robots.txt itself
    DisallowAll,
    /// Rules from a retrieved robots.txt body
    Rules(String),
}

impl RobotsPolicy {
    pub fn from_content(content: &str) -> Self {
        if content.trim().is_empty() {
            Self::AllowAll
        } else {
            Self::Rules(content.to_string())
        }
    }

    /// Maps a robots.txt response to a policy.
    ///
    /// 401/403 forbid the whole site, other client errors mean there are no
    /// rules, and server errors are treated as unreachable (allow).
    pub fn from_response(status: u16, body: &str) -> Self {
        match status {
            200..=299 => Self::from_content(body),
            401 | 403 => Self::DisallowAll,
            _ => Self::AllowAll,
        }
    }

    /// Checks `url` (absolute) for the crawler's product token
    pub fn is_allowed(&self, url: &str, product_token: &str) -> bool {
        match self {
            Self::AllowAll => true,
            Self::DisallowAll => false,
            Self::Rules(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, product_token, url)
            }
        }
    }
}

/// The product token robots.txt groups are matched against: the part of a
/// User-Agent before the first `/`
pub fn product_token(user_agent: &str) -> &str {
    user_agent
        .split('/')
        .next()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("*")
}
