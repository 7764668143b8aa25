pub mod error;
pub mod event;
pub mod memory;
pub mod outbox;
pub mod postgres;
pub mod store;

pub use common::{AggregateId, TenantId};
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use outbox::{
    ClaimRequest, OutboxMessage, OutboxMessageId, OutboxStatus, OutboxStore, TenantFilter,
};
pub use postgres::PostgresEventStore;
pub use store::{
    AppendRequest, EventStore, EventStoreExt, StreamInfo, UniqueKey, validate_append,
};
