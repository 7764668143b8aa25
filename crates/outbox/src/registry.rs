//! Maps stored event type identifiers back to integration event contracts.

use std::collections::HashMap;

use domain::integration::{
    BuildingDeletedV1, BuildingRegisteredV1, CompanyDeletedV1, CompanyRegisteredV1,
    CompanyRenamedV1, PropertyDeletedV1, PropertyRegisteredV1, UnitDeletedV1, UnitRegisteredV1,
};
use domain::{IntegrationEvent, IntegrationEventContract};

use crate::error::{OutboxError, Result};

type Decoder = fn(&[u8]) -> std::result::Result<IntegrationEvent, serde_json::Error>;

fn decode<C: IntegrationEventContract>(
    payload: &[u8],
) -> std::result::Result<IntegrationEvent, serde_json::Error> {
    serde_json::from_slice::<C>(payload).map(C::into_event)
}

/// Registry of decodable integration event types.
#[derive(Debug, Clone, Default)]
pub struct EventTypeRegistry {
    decoders: HashMap<&'static str, Decoder>,
}

impl EventTypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every contract the service publishes.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register::<CompanyRegisteredV1>();
        registry.register::<CompanyRenamedV1>();
        registry.register::<CompanyDeletedV1>();
        registry.register::<PropertyRegisteredV1>();
        registry.register::<PropertyDeletedV1>();
        registry.register::<BuildingRegisteredV1>();
        registry.register::<BuildingDeletedV1>();
        registry.register::<UnitRegisteredV1>();
        registry.register::<UnitDeletedV1>();
        registry
    }

    /// Registers a contract under its `EVENT_TYPE`.
    pub fn register<C: IntegrationEventContract>(&mut self) {
        self.decoders.insert(C::EVENT_TYPE, decode::<C>);
    }

    /// Registered event types, sorted.
    pub fn event_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.decoders.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Decodes a stored payload.
    pub fn decode(&self, event_type: &str, payload: &[u8]) -> Result<IntegrationEvent> {
        let decoder = self
            .decoders
            .get(event_type)
            .ok_or_else(|| OutboxError::UnknownEventType(event_type.to_string()))?;
        Ok(decoder(payload)?)
    }
}
