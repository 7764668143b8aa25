//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::{EventEnvelope, Version};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::DomainError;
use crate::integration::IntegrationEvent;
use crate::validation::codes;

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// This is stored with the event and shown in the audit log.
    fn event_type(&self) -> &'static str;
}

/// Lifecycle shared by every aggregate in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Lifecycle {
    /// No events folded yet.
    #[default]
    New,

    /// Registered and accepting operations.
    Active,

    /// Logically deleted (terminal). History stays readable.
    Deleted,
}

impl Lifecycle {
    /// Fails unless the aggregate is active.
    pub fn ensure_active(self, what: &str) -> Result<(), DomainError> {
        match self {
            Lifecycle::Active => Ok(()),
            Lifecycle::Deleted => Err(DomainError::violation(
                codes::ENTITY_DELETED,
                format!("{what} is deleted"),
            )),
            Lifecycle::New => Err(DomainError::violation(
                codes::NOT_REGISTERED,
                format!("{what} is not registered"),
            )),
        }
    }

    /// Fails unless no events have been applied yet.
    pub fn ensure_new(self, what: &str) -> Result<(), DomainError> {
        match self {
            Lifecycle::New => Ok(()),
            Lifecycle::Active | Lifecycle::Deleted => Err(DomainError::violation(
                codes::ALREADY_REGISTERED,
                format!("{what} is already registered"),
            )),
        }
    }

    /// Fails unless the aggregate can still be deleted.
    pub fn ensure_deletable(self, what: &str) -> Result<(), DomainError> {
        match self {
            Lifecycle::Active => Ok(()),
            Lifecycle::Deleted => Err(DomainError::violation(
                codes::ALREADY_DELETED,
                format!("{what} is already deleted"),
            )),
            Lifecycle::New => Err(DomainError::violation(
                codes::NOT_REGISTERED,
                format!("{what} is not registered"),
            )),
        }
    }
}

/// Trait for aggregates in an event-sourced system.
///
/// In event sourcing, aggregates:
/// - Are rebuilt by replaying events
/// - Decide on commands by returning events from `&self` methods
/// - Apply events to update state (pure, deterministic)
pub trait Aggregate: Default + Clone + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's unique identifier.
    ///
    /// Returns None for a new, uninitialized aggregate.
    fn id(&self) -> Option<AggregateId>;

    /// Returns true once the terminal delete event has been applied.
    fn is_deleted(&self) -> bool;

    /// Applies an event to the aggregate, updating its state.
    ///
    /// This method must be pure and deterministic:
    /// - Given the same state and event, it must always produce the same new state
    /// - It must not have side effects
    /// - It must not fail (events represent facts that have happened)
    fn apply(&mut self, event: &Self::Event);

    /// Maps a domain event to the integration event published for it.
    ///
    /// Called on the state after `event` was applied. Returns None for
    /// events that stay inside the service.
    fn integration_event(&self, event: &Self::Event) -> Option<IntegrationEvent>;
}

/// Aggregates whose history can be rendered as an audit log.
pub trait Auditable: Aggregate {
    /// Describes what `event` changed, given the state before it.
    fn audit_data(previous: &Self, event: &Self::Event) -> serde_json::Value;
}

/// Aggregate state paired with the number of events folded into it.
///
/// `fold` is the only way to change either, so the version always equals
/// the number of applied events.
#[derive(Debug, Clone, Default)]
pub struct Versioned<A: Aggregate> {
    state: A,
    version: Version,
}

impl<A: Aggregate> Versioned<A> {
    /// Creates an empty aggregate at the initial version.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds an aggregate from a sequence of events.
    pub fn replay<'a>(events: impl IntoIterator<Item = &'a A::Event>) -> Self
    where
        A::Event: 'a,
    {
        let mut aggregate = Self::new();
        for event in events {
            aggregate.fold(event);
        }
        aggregate
    }

    /// Rebuilds an aggregate from stored envelopes, decoding each payload.
    pub fn from_envelopes(envelopes: &[EventEnvelope]) -> Result<Self, DomainError> {
        let mut aggregate = Self::new();
        for envelope in envelopes {
            let event: A::Event = serde_json::from_value(envelope.payload.clone())?;
            aggregate.fold(&event);
        }
        Ok(aggregate)
    }

    /// Applies one event and advances the version.
    pub fn fold(&mut self, event: &A::Event) {
        self.state.apply(event);
        self.version = self.version.next();
    }

    /// Returns the current state.
    pub fn state(&self) -> &A {
        &self.state
    }

    /// Returns the number of events folded so far.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Consumes the wrapper, returning the state.
    pub fn into_state(self) -> A {
        self.state
    }
}
