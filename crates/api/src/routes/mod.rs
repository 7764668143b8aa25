//! HTTP route handlers.

pub mod buildings;
pub mod companies;
pub mod health;
pub mod metrics;
pub mod outbox;
pub mod properties;
pub mod units;

use common::AggregateId;
use domain::{AuditReconstructor, CommandBus};
use event_store::{EventStore, OutboxStore};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub bus: CommandBus<S>,
    pub audit: AuditReconstructor<S>,
    pub store: S,
}

/// Bounds every store used behind the HTTP API must satisfy.
pub trait AppStore: EventStore + OutboxStore + Clone + 'static {}

impl<T: EventStore + OutboxStore + Clone + 'static> AppStore for T {}

/// Parses an aggregate id from a path segment.
pub fn parse_id(raw: &str) -> Result<AggregateId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid id '{raw}': {e}")))
}

// -- Shared request and response types --

#[derive(Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

#[derive(Serialize)]
pub struct CreatedResponse {
    pub id: String,
}

impl CreatedResponse {
    pub fn new(id: AggregateId) -> Self {
        Self { id: id.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_rejects_garbage() {
        let id = AggregateId::new();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
        assert!(matches!(parse_id("42"), Err(ApiError::BadRequest(_))));
    }
}
