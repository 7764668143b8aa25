use thiserror::Error;

use crate::{AggregateId, OutboxMessageId, OutboxStatus, Version};

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// A concurrency conflict occurred when appending events.
    /// The expected version did not match the actual version.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// A stream was started for an aggregate that already has one.
    #[error("Stream already exists: {0}")]
    StreamAlreadyExists(AggregateId),

    /// The stream was not found in the event store.
    #[error("Stream not found: {0}")]
    StreamNotFound(AggregateId),

    /// A unique key is already claimed by another aggregate of the tenant.
    #[error("Unique key {scope}={value} is already taken")]
    UniqueKeyViolation { scope: String, value: String },

    /// The append request itself is malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// The outbox message does not exist for this tenant.
    #[error("Outbox message not found: {0}")]
    OutboxMessageNotFound(OutboxMessageId),

    /// The caller no longer holds the claim lease on an outbox message.
    #[error("Outbox message {0} is not leased by this worker")]
    OutboxLeaseLost(OutboxMessageId),

    /// The outbox message is not in a state that allows the transition.
    #[error("Outbox message {id} cannot move from {from} to {to}")]
    InvalidOutboxTransition {
        id: OutboxMessageId,
        from: OutboxStatus,
        to: OutboxStatus,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A failure injected by the in-memory store for testing.
    #[error("Injected failure: {0}")]
    Injected(String),
}

impl EventStoreError {
    /// Returns true when retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            EventStoreError::Database(err) => matches!(
                err,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
            EventStoreError::Injected(_) => true,
            _ => false,
        }
    }
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
