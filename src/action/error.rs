//! Action client error types.

use super::retry::RetryError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by [`ActionClient`](super::ActionClient) operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ActionError {
    /// Handshake did not complete within the configured bound
    #[error("Action server for client '{client}' unavailable after {timeout:?}")]
    ServerUnavailable { client: String, timeout: Duration },

    /// Retry requested before any goal was sent
    #[error("Client '{client}' has no goal to resubmit")]
    NoGoal { client: String },

    #[error(transparent)]
    Retry(#[from] RetryError),
}
