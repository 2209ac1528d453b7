//! Controller-specific error types.
//!
//! This module defines error types specific to the Pod Restart Alerter
//! that are not covered by upstream library errors.

use kube::Error as KubeError;
use teams_client::TeamsError;
use thiserror::Error;

/// Errors that can occur in the Pod Restart Alerter.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Teams webhook error
    #[error("Teams error: {0}")]
    Teams(#[from] TeamsError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Reconciliation failed
    #[error("Reconciliation failed: {0}")]
    Reconciliation(String),
}
