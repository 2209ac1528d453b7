//! TeamsClient trait for mocking
//!
//! The controller depends on this trait rather than on `TeamsClient`
//! directly, so reconciliation can be unit tested without a webhook.

use crate::error::TeamsError;
use crate::models::TeamsMessage;

/// Trait for delivering messages to a Teams channel
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait TeamsClientTrait: Send + Sync {
    /// Deliver a message, retrying transient failures according to the
    /// client's retry policy. Returns the last error once attempts run out.
    async fn send_message(&self, message: &TeamsMessage) -> Result<(), TeamsError>;
}
