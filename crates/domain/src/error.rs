//! Domain error types.

use common::AggregateId;
use event_store::{EventStoreError, Version};
use serde::Serialize;
use thiserror::Error;

/// A rejected domain operation with a stable, machine-readable code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusinessViolation {
    /// Stable rule identifier, e.g. `ALREADY_DELETED`.
    pub code: &'static str,

    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for BusinessViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Aggregate not found (or not visible to the caller).
    #[error("{aggregate_type} {aggregate_id} not found")]
    NotFound {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },

    /// The operation collides with existing state, e.g. a duplicate code.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A business rule rejected the operation.
    #[error("Business rule violated: {0}")]
    BusinessViolation(BusinessViolation),

    /// The stream moved on while the command was being decided, twice.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The caller is not allowed to perform the operation.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The infrastructure failed in a way that may succeed on retry.
    #[error("Transient infrastructure failure: {0}")]
    TransientInfrastructure(String),

    /// The command was cancelled before it completed.
    #[error("Operation cancelled")]
    Cancelled,

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(EventStoreError),
}

impl DomainError {
    /// Creates a business rule violation.
    pub fn violation(code: &'static str, message: impl Into<String>) -> Self {
        DomainError::BusinessViolation(BusinessViolation {
            code,
            message: message.into(),
        })
    }

    /// Returns the violation code, if this is a business rule violation.
    pub fn violation_code(&self) -> Option<&'static str> {
        match self {
            DomainError::BusinessViolation(violation) => Some(violation.code),
            _ => None,
        }
    }

    /// Short label used in metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::NotFound { .. } => "not_found",
            DomainError::Conflict(_) => "conflict",
            DomainError::BusinessViolation(_) => "business_violation",
            DomainError::ConcurrencyConflict { .. } => "concurrency_conflict",
            DomainError::Unauthorized(_) => "unauthorized",
            DomainError::TransientInfrastructure(_) => "transient",
            DomainError::Cancelled => "cancelled",
            DomainError::Serialization(_) => "serialization",
            DomainError::EventStore(_) => "event_store",
        }
    }
}

impl From<EventStoreError> for DomainError {
    fn from(err: EventStoreError) -> Self {
        match err {
            EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual,
            } => DomainError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual,
            },
            EventStoreError::UniqueKeyViolation { scope, value } => {
                DomainError::Conflict(format!("{scope} '{value}' is already in use"))
            }
            EventStoreError::StreamAlreadyExists(id) => {
                DomainError::Conflict(format!("Aggregate {id} already exists"))
            }
            EventStoreError::StreamNotFound(aggregate_id) => DomainError::NotFound {
                aggregate_type: "Stream",
                aggregate_id,
            },
            EventStoreError::Serialization(e) => DomainError::Serialization(e),
            err if err.is_transient() => DomainError::TransientInfrastructure(err.to_string()),
            err => DomainError::EventStore(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_are_translated() {
        let err: DomainError = EventStoreError::UniqueKeyViolation {
            scope: "company.code".to_string(),
            value: "ACME".to_string(),
        }
        .into();
        assert!(matches!(err, DomainError::Conflict(_)));

        let err: DomainError = EventStoreError::ConcurrencyConflict {
            aggregate_id: AggregateId::new(),
            expected: Version::new(1),
            actual: Version::new(2),
        }
        .into();
        assert_eq!(err.kind(), "concurrency_conflict");
    }

    #[test]
    fn retryable_store_failures_are_transient() {
        let err: DomainError = EventStoreError::Injected("connection reset".to_string()).into();
        assert!(matches!(err, DomainError::TransientInfrastructure(_)));

        let err: DomainError = EventStoreError::InvalidAppend("bad".to_string()).into();
        assert!(matches!(err, DomainError::EventStore(_)));
    }

    #[test]
    fn violation_exposes_code() {
        let err = DomainError::violation("ALREADY_DELETED", "Company is already deleted");
        assert_eq!(err.violation_code(), Some("ALREADY_DELETED"));
        assert_eq!(
            err.to_string(),
            "Business rule violated: ALREADY_DELETED: Company is already deleted"
        );
    }
}
