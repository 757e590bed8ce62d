//! Saved browser session state
//!
//! The file layout is the common "storage state" JSON: a `cookies` array and
//! an `origins` array of per-origin local storage entries. Missing or broken
//! files degrade to an anonymous session.

use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub cookies: Vec<SavedCookie>,
    #[serde(default)]
    pub origins: Vec<SavedOrigin>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedOrigin {
    pub origin: String,
    #[serde(default)]
    pub local_storage: Vec<StorageEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageEntry {
    pub name: String,
    pub value: String,
}

fn default_path() -> String {
    "/".to_string()
}

impl SessionState {
    pub fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Loads a session file, returning `None` (with a warning) if it is
    /// absent, empty or unreadable
    pub fn load_or_warn(path: &Path) -> Option<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) if !content.trim().is_empty() => content,
            Ok(_) => {
                warn!("Session file {} is empty. Proceeding without session.", path.display());
                return None;
            }
            Err(e) => {
                warn!(
                    "Cannot read session file {}: {}. Proceeding without session.",
                    path.display(),
                    e
                );
                return None;
            }
        };

        match Self::from_json_str(&content) {
            Ok(state) => {
                info!(
                    "Loaded session from {} ({} cookies, {} origins)",
                    path.display(),
                    state.cookies.len(),
                    state.origins.len()
                );
                Some(state)
            }
            Err(e) => {
                warn!(
                    "Invalid session file {}: {}. Proceeding without session.",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    /// Script run before any page script that restores local storage for
    /// the matching origin
    pub fn local_storage_script(&self) -> Option<String> {
        let origins: Vec<serde_json::Value> = self
            .origins
            .iter()
            .filter(|o| !o.local_storage.is_empty())
            .map(|o| {
                let entries: Vec<[&str; 2]> = o
                    .local_storage
                    .iter()
                    .map(|e| [e.name.as_str(), e.value.as_str()])
                    .collect();
                serde_json::json!({ "origin": o.origin, "entries": entries })
            })
            .collect();
        if origins.is_empty() {
            return None;
        }

        let data = serde_json::Value::Array(origins).to_string();
        Some(format!(
            "(() => {{ const saved = {}; for (const o of saved) {{ \
             if (o.origin !== window.location.origin) continue; \
             for (const [k, v] of o.entries) {{ try {{ window.localStorage.setItem(k, v); }} catch (e) {{}} }} \
             }} }})();",
            data
        ))
    }
}
