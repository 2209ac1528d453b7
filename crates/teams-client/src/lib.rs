//! Microsoft Teams Webhook Client
//!
//! Delivers alert cards to a Teams incoming webhook. Knows nothing about
//! Kubernetes; callers build a `TeamsMessage` and hand it over.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use teams_client::{TeamsClient, TeamsClientTrait, TeamsMessage, THEME_COLOR_WARNING};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = TeamsClient::new(
//!     "https://example.webhook.office.com/webhookb2/...",
//!     Duration::from_secs(10),
//! )?;
//!
//! let message = TeamsMessage::new("Pod restarted", "default/web-0/app restarted", THEME_COLOR_WARNING);
//! client.send_message(&message).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Retry Logic**: transport errors, 5xx and 429 are retried with exponential backoff
//! - **Classification**: other 4xx responses fail fast as permanent rejections
//! - **Mocking**: `MockTeamsClient` behind the `test-util` feature

pub mod backoff;
pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod teams_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::{DEFAULT_TIMEOUT, RetryPolicy, TeamsClient};
pub use error::TeamsError;
pub use reqwest::StatusCode;
pub use models::*;
pub use teams_trait::TeamsClientTrait;
#[cfg(feature = "test-util")]
pub use mock::MockTeamsClient;
