use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{AggregateId, EventEnvelope, OutboxMessage, Result, TenantId, Version};

/// A tenant-scoped uniqueness claim, e.g. `("company.code", "ACME")`.
///
/// Claims are written in the same transaction as the events, so two racing
/// creates with the same key cannot both commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniqueKey {
    pub scope: String,
    pub value: String,
}

impl UniqueKey {
    /// Creates a unique key.
    pub fn new(scope: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.scope, self.value)
    }
}

/// Summary of a stream without its events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    pub version: Version,
    pub archived: bool,
}

/// Everything that must commit together for one command.
#[derive(Debug, Clone)]
pub struct AppendRequest {
    /// Tenant that owns the stream.
    pub tenant_id: TenantId,

    /// The stream to append to.
    pub aggregate_id: AggregateId,

    /// Version the caller based its decision on.
    pub expected_version: Version,

    /// Events to append, versions `expected_version + 1 ..`.
    pub events: Vec<EventEnvelope>,

    /// Outbox rows written in the same transaction.
    pub outbox: Vec<OutboxMessage>,

    /// Unique keys to claim for this aggregate.
    pub claim_keys: Vec<UniqueKey>,

    /// Unique keys owned by this aggregate to release.
    pub release_keys: Vec<UniqueKey>,

    /// Marks the stream archived (logical deletion).
    pub archive: bool,
}

impl AppendRequest {
    /// Creates an empty request for a stream at the expected version.
    pub fn new(tenant_id: TenantId, aggregate_id: AggregateId, expected_version: Version) -> Self {
        Self {
            tenant_id,
            aggregate_id,
            expected_version,
            events: Vec::new(),
            outbox: Vec::new(),
            claim_keys: Vec::new(),
            release_keys: Vec::new(),
            archive: false,
        }
    }

    /// Creates a request that starts a new stream.
    pub fn start(tenant_id: TenantId, aggregate_id: AggregateId) -> Self {
        Self::new(tenant_id, aggregate_id, Version::initial())
    }

    /// Sets the events to append.
    pub fn events(mut self, events: Vec<EventEnvelope>) -> Self {
        self.events = events;
        self
    }

    /// Sets the outbox rows to write.
    pub fn outbox(mut self, messages: Vec<OutboxMessage>) -> Self {
        self.outbox = messages;
        self
    }

    /// Adds a unique key claim.
    pub fn claim_key(mut self, key: UniqueKey) -> Self {
        self.claim_keys.push(key);
        self
    }

    /// Adds a unique key release.
    pub fn release_key(mut self, key: UniqueKey) -> Self {
        self.release_keys.push(key);
        self
    }

    /// Marks the stream as archived.
    pub fn archive(mut self) -> Self {
        self.archive = true;
        self
    }

    /// Returns the version the stream will have after the append.
    pub fn target_version(&self) -> Version {
        self.events
            .last()
            .map(|e| e.version)
            .unwrap_or(self.expected_version)
    }

    /// Returns the aggregate type of the events.
    pub fn aggregate_type(&self) -> &str {
        self.events
            .first()
            .map(|e| e.aggregate_type.as_str())
            .unwrap_or_default()
    }
}

/// Core trait for event store implementations.
///
/// An event store persists per-aggregate event streams, partitioned by tenant.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Starts a new stream with its first events.
    ///
    /// Fails with `StreamAlreadyExists` if the stream exists, regardless of
    /// the payload. Returns the version after appending.
    async fn start_stream(&self, request: AppendRequest) -> Result<Version>;

    /// Appends events to an existing stream.
    ///
    /// Events, outbox rows, key claims/releases and the archive marker are
    /// committed atomically - either all succeed or none do. Fails with
    /// `ConcurrencyConflict` if the current version differs from
    /// `request.expected_version`.
    ///
    /// Returns the new version of the stream.
    async fn append(&self, request: AppendRequest) -> Result<Version>;

    /// Retrieves all events of a stream in version order.
    ///
    /// Fails with `StreamNotFound` if the stream has no events.
    async fn fetch_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Returns stream metadata, or None if the stream doesn't exist.
    async fn stream_info(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Option<StreamInfo>>;

    /// Returns the aggregate currently holding a unique key.
    async fn unique_key_owner(
        &self,
        tenant_id: TenantId,
        key: &UniqueKey,
    ) -> Result<Option<AggregateId>>;
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Gets the current version of a stream, None if it doesn't exist.
    async fn stream_version(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Option<Version>> {
        Ok(self
            .stream_info(tenant_id, aggregate_id)
            .await?
            .map(|info| info.version))
    }

    /// Checks if a stream exists (has any events).
    async fn stream_exists(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.stream_info(tenant_id, aggregate_id).await?.is_some())
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Error returned when building an invalid append request.
#[derive(Debug, Clone)]
pub struct AppendValidationError {
    pub message: String,
}

impl std::fmt::Display for AppendValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Append validation error: {}", self.message)
    }
}

impl std::error::Error for AppendValidationError {}

impl From<AppendValidationError> for crate::EventStoreError {
    fn from(err: AppendValidationError) -> Self {
        crate::EventStoreError::InvalidAppend(err.message)
    }
}

/// Validates a request before appending.
pub fn validate_append(request: &AppendRequest) -> std::result::Result<(), AppendValidationError> {
    if request.events.is_empty() {
        return Err(AppendValidationError {
            message: "Cannot append empty event list".to_string(),
        });
    }

    // All events must be for the request's stream
    let first = &request.events[0];
    for event in &request.events {
        if event.aggregate_id != request.aggregate_id || event.tenant_id != request.tenant_id {
            return Err(AppendValidationError {
                message: "All events must be for the same tenant and aggregate".to_string(),
            });
        }
        if event.aggregate_type != first.aggregate_type {
            return Err(AppendValidationError {
                message: "All events must have the same aggregate type".to_string(),
            });
        }
    }

    if request
        .outbox
        .iter()
        .any(|message| message.tenant_id != request.tenant_id)
    {
        return Err(AppendValidationError {
            message: "Outbox messages must belong to the stream's tenant".to_string(),
        });
    }

    // Versions must continue from the expected version without gaps
    let mut expected_version = request.expected_version;
    for event in &request.events {
        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(AppendValidationError {
                message: format!(
                    "Event versions must be sequential. Expected {}, got {}",
                    expected_version, event.version
                ),
            });
        }
    }

    Ok(())
}
