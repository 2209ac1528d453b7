//! Teams client errors

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when delivering a message to a Teams webhook
#[derive(Debug, Error)]
pub enum TeamsError {
    /// Transport-level failure (connect, timeout, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Webhook answered with a status worth retrying (5xx, 429)
    #[error("webhook returned {status}: {body}")]
    Status {
        /// HTTP status returned by the webhook
        status: StatusCode,
        /// Response body, truncated
        body: String,
    },

    /// Webhook refused the request (4xx); retrying will not help
    #[error("webhook rejected request with {status}: {body}")]
    Rejected {
        /// HTTP status returned by the webhook
        status: StatusCode,
        /// Response body, truncated
        body: String,
    },

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Webhook URL is not a usable http(s) URL
    #[error("Invalid webhook URL: {0}")]
    InvalidUrl(String),
}

impl TeamsError {
    /// Whether another attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_builder(),
            Self::Status { .. } => true,
            Self::Rejected { .. } | Self::Serialization(_) | Self::InvalidUrl(_) => false,
        }
    }

    /// Whether the error points at a configuration problem rather than an outage.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::InvalidUrl(_))
    }
}
