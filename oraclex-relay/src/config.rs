/// Relay connection configuration
///
/// Values come from the environment with hard defaults, the same way the
/// dashboard binaries pick up their URLs.
use std::time::Duration;

use tracing::warn;

/// Production relay used when `RELAY_URL` is unset
pub const DEFAULT_RELAY_URL: &str = "https://oraclex-relay-production.up.railway.app";

/// Per-request budget used when `RELAY_TIMEOUT_SECS` is unset
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Relay client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Base URL of the relay service
    pub base_url: String,
    /// Upper bound for a single HTTP request
    pub request_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_RELAY_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl RelayConfig {
    /// Create a new configuration with custom base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Read `RELAY_URL` and `RELAY_TIMEOUT_SECS`, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(url) = env_string("RELAY_URL") {
            config.base_url = url;
        }

        if let Some(raw) = env_string("RELAY_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.request_timeout = Duration::from_secs(secs),
                _ => warn!(value = %raw, "ignoring invalid RELAY_TIMEOUT_SECS"),
            }
        }

        config
    }
}

/// Trimmed, non-empty environment variable
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
