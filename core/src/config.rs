//! Client configuration loaded from the environment.

use std::env;
use std::time::Duration;

use crate::storage::DEFAULT_PREFIX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Prepended to every relative descriptor URL.
    pub base_url: String,
    pub storage_prefix: String,
    pub refresh_path: String,
    /// Requests to this path never trigger a token refresh.
    pub sign_out_path: String,
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            storage_prefix: DEFAULT_PREFIX.to_string(),
            refresh_path: "/refresh-token".to_string(),
            sign_out_path: "/sign-out".to_string(),
            timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("COURIER_API_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            storage_prefix: env::var("COURIER_STORAGE_PREFIX").unwrap_or(defaults.storage_prefix),
            refresh_path: defaults.refresh_path,
            sign_out_path: defaults.sign_out_path,
            timeout: env::var("COURIER_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
        }
    }

    /// Resolve a descriptor URL against `base_url`. Absolute URLs pass
    /// through unchanged.
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        if url.starts_with('/') {
            format!("{}{url}", self.base_url)
        } else {
            format!("{}/{url}", self.base_url)
        }
    }
}
