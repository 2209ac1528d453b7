//! Teams webhook client
//!
//! Posts `TeamsMessage` payloads to an incoming webhook URL and classifies
//! the outcome. Transport errors, 5xx and 429 responses are retried with
//! exponential backoff; any other 4xx is treated as a permanent rejection.

use crate::backoff::ExponentialBackoff;
use crate::error::TeamsError;
use crate::models::TeamsMessage;
use crate::teams_trait::TeamsClientTrait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest response body kept in error messages
const MAX_ERROR_BODY: usize = 500;

/// How many times to attempt a delivery and how long to wait in between
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_backoff: Duration,
    /// Cap for any single delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Teams incoming webhook client
#[derive(Debug, Clone)]
pub struct TeamsClient {
    client: Client,
    webhook_url: Url,
    retry: RetryPolicy,
}

impl TeamsClient {
    /// Create a new Teams client
    ///
    /// # Arguments
    /// * `webhook_url` - Incoming webhook URL; must be `http` or `https`
    /// * `timeout` - Per-request timeout, covering connect through body
    pub fn new(webhook_url: &str, timeout: Duration) -> Result<Self, TeamsError> {
        let webhook_url = validate_url(webhook_url)?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            webhook_url,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Host of the webhook, safe to log (the path carries the secret)
    pub fn webhook_host(&self) -> &str {
        self.webhook_url.host_str().unwrap_or("<none>")
    }

    /// Issue a single POST of an encoded payload and classify the response
    async fn post_once(&self, payload: &[u8]) -> Result<(), TeamsError> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_vec())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body: String = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(MAX_ERROR_BODY)
            .collect();

        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            Err(TeamsError::Rejected { status, body })
        } else {
            Err(TeamsError::Status { status, body })
        }
    }
}

#[async_trait::async_trait]
impl TeamsClientTrait for TeamsClient {
    async fn send_message(&self, message: &TeamsMessage) -> Result<(), TeamsError> {
        let payload = encode(message)?;
        let max_attempts = self.retry.max_attempts.max(1);
        let mut backoff = ExponentialBackoff::new(self.retry.initial_backoff, self.retry.max_backoff);
        let mut attempt = 1;

        loop {
            match self.post_once(&payload).await {
                Ok(()) => {
                    debug!(attempt, "Message delivered to Teams");
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = backoff.next_backoff();
                    warn!(
                        attempt,
                        max_attempts,
                        error = %e,
                        "Teams delivery failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Serialize a message into the webhook's JSON body
fn encode(message: &TeamsMessage) -> Result<Vec<u8>, TeamsError> {
    Ok(serde_json::to_vec(message)?)
}

/// Parse a webhook URL and check that it can be posted to
pub fn validate_url(raw: &str) -> Result<Url, TeamsError> {
    let url = Url::parse(raw.trim()).map_err(|e| TeamsError::InvalidUrl(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(TeamsError::InvalidUrl(format!(
                "unsupported scheme '{other}', expected http or https"
            )));
        }
    }

    if url.host_str().is_none() {
        return Err(TeamsError::InvalidUrl("missing host".to_string()));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_accepts_https() {
        let url = validate_url("https://example.webhook.office.com/webhookb2/abc").expect("valid url");
        assert_eq!(url.host_str(), Some("example.webhook.office.com"));
    }

    #[test]
    fn test_validate_url_rejects_other_schemes() {
        let err = validate_url("ftp://example.com/hook").expect_err("ftp is not allowed");
        assert!(matches!(err, TeamsError::InvalidUrl(_)));
        assert!(err.is_permanent());
    }

    #[test]
    fn test_validate_url_rejects_garbage() {
        assert!(validate_url("not a url").is_err());
        assert!(validate_url("").is_err());
    }

    #[test]
    fn test_webhook_host_hides_path() {
        let client = TeamsClient::new("https://hooks.example.com/secret/token", DEFAULT_TIMEOUT)
            .expect("client");
        assert_eq!(client.webhook_host(), "hooks.example.com");
    }

    #[test]
    fn test_error_classification() {
        let transient = TeamsError::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: String::new(),
        };
        assert!(transient.is_retryable());
        assert!(!transient.is_permanent());

        let rejected = TeamsError::Rejected {
            status: StatusCode::BAD_REQUEST,
            body: String::new(),
        };
        assert!(!rejected.is_retryable());
        assert!(rejected.is_permanent());
    }

    #[test]
    fn test_encode_matches_card_schema() {
        let message = TeamsMessage::new("summary", "body", "#FFA500");
        let payload = encode(&message).expect("encode");
        let value: serde_json::Value = serde_json::from_slice(&payload).expect("json");
        assert_eq!(
            value,
            serde_json::json!({"summary": "summary", "text": "body", "themeColor": "#FFA500"})
        );
    }

    #[test]
    fn test_serialization_error_is_not_retried() {
        let err: TeamsError = serde_json::from_str::<serde_json::Value>("{")
            .expect_err("truncated json")
            .into();
        assert!(matches!(err, TeamsError::Serialization(_)));
        assert!(!err.is_retryable());
    }
}
