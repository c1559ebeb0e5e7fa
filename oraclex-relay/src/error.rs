use std::time::Duration;

use thiserror::Error;

/// All errors generated while talking to the relay.
///
/// Underlying transport errors are captured as strings so the error stays
/// cheap to clone into logs and cycle reports.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum RelayError {
    #[error("invalid relay url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {endpoint} failed: {reason}")]
    Request { endpoint: String, reason: String },

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("{endpoint} timed out after {millis}ms")]
    Timeout { endpoint: String, millis: u64 },

    #[error("malformed payload from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },
}

impl RelayError {
    /// Determine if the error is likely to clear up on the next refresh cycle.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_transient(&self) -> bool {
        match self {
            RelayError::Request { .. } | RelayError::Timeout { .. } => true,
            RelayError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Endpoint the error relates to, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            RelayError::InvalidUrl { .. } => None,
            RelayError::Request { endpoint, .. }
            | RelayError::Status { endpoint, .. }
            | RelayError::Timeout { endpoint, .. }
            | RelayError::Malformed { endpoint, .. } => Some(endpoint.as_str()),
        }
    }

    /// Short form for the debug panel: endpoint path plus the failure kind.
    pub fn summary(&self) -> String {
        match self {
            RelayError::InvalidUrl { url, .. } => format!("invalid relay url {url}"),
            RelayError::Request { endpoint, reason } => {
                format!("{} unreachable ({})", short_endpoint(endpoint), first_line(reason))
            }
            RelayError::Status { endpoint, status } => {
                format!("{} HTTP {}", short_endpoint(endpoint), status)
            }
            RelayError::Timeout { endpoint, millis } => {
                format!("{} timeout {}ms", short_endpoint(endpoint), millis)
            }
            RelayError::Malformed { endpoint, .. } => {
                format!("{} malformed JSON", short_endpoint(endpoint))
            }
        }
    }

    pub(crate) fn from_reqwest(endpoint: &str, budget: Duration, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            RelayError::Timeout {
                endpoint: endpoint.to_string(),
                millis: budget.as_millis() as u64,
            }
        } else if error.is_decode() {
            RelayError::Malformed {
                endpoint: endpoint.to_string(),
                reason: error.to_string(),
            }
        } else {
            RelayError::Request {
                endpoint: endpoint.to_string(),
                reason: error.to_string(),
            }
        }
    }
}

/// Path portion of an endpoint URL, e.g. `/analysis/XAUUSD`
fn short_endpoint(endpoint: &str) -> &str {
    endpoint
        .split_once("://")
        .map(|(_, rest)| rest)
        .and_then(|rest| rest.find('/').map(|idx| &rest[idx..]))
        .unwrap_or(endpoint)
}

fn first_line(reason: &str) -> &str {
    reason.lines().next().unwrap_or(reason)
}
