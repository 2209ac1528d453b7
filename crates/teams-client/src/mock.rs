//! Mock TeamsClient for unit testing
//!
//! Records every message it is asked to send and can be primed with
//! failures, so callers can exercise their error paths without a webhook.

use crate::error::TeamsError;
use crate::models::TeamsMessage;
use crate::teams_trait::TeamsClientTrait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Mock TeamsClient for testing
#[derive(Debug, Clone, Default)]
pub struct MockTeamsClient {
    attempted: Arc<Mutex<Vec<TeamsMessage>>>,
    delivered: Arc<Mutex<Vec<TeamsMessage>>>,
    failures: Arc<Mutex<VecDeque<TeamsError>>>,
}

impl MockTeamsClient {
    /// Create a new mock client that accepts every message
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `send_message` call fail with `error`.
    ///
    /// Calls are consumed in order, one queued error per send.
    pub fn fail_next(&self, error: TeamsError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(error);
    }

    /// Every message passed to `send_message`, successful or not
    pub fn attempted(&self) -> Vec<TeamsMessage> {
        self.attempted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages that were accepted
    pub fn delivered(&self) -> Vec<TeamsMessage> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl TeamsClientTrait for MockTeamsClient {
    async fn send_message(&self, message: &TeamsMessage) -> Result<(), TeamsError> {
        self.attempted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());

        let failure = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(error) = failure {
            return Err(error);
        }

        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}
