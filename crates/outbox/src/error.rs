//! Outbox error types.

use event_store::EventStoreError;
use thiserror::Error;

/// Errors returned by a [`Publisher`](crate::Publisher).
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    /// The broker could not be reached.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// The broker refused the message.
    #[error("Broker rejected message: {0}")]
    Rejected(String),
}

/// Errors that can occur while draining the outbox.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// The stored event type has no registered decoder.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// The payload does not match its contract.
    #[error("Failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// Claiming or updating a row failed.
    #[error("Event store error: {0}")]
    Store(#[from] EventStoreError),
}

/// Result type alias for outbox operations.
pub type Result<T> = std::result::Result<T, OutboxError>;
