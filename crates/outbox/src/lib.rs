//! Transactional outbox processing.
//!
//! Outbox rows are written by the event store in the same transaction as the
//! events that produced them. The [`OutboxProcessor`] claims due rows, decodes
//! them through the [`EventTypeRegistry`] and hands them to a [`Publisher`].
//! Delivery is at-least-once.

pub mod error;
pub mod policy;
pub mod processor;
pub mod publisher;
pub mod registry;

pub use error::{OutboxError, PublishError, Result};
pub use policy::RetryPolicy;
pub use processor::{BatchReport, MIN_POLL_INTERVAL, OutboxProcessor, OutboxProcessorConfig};
pub use publisher::{InMemoryPublisher, LoggingPublisher, PublishedMessage, Publisher};
pub use registry::EventTypeRegistry;
