//! Property domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::Address;

/// Events that can occur on a property aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PropertyEvent {
    /// Property was registered under a company.
    PropertyRegistered(PropertyRegisteredData),

    /// Property was renamed.
    PropertyRenamed(PropertyRenamedData),

    /// Property address was changed.
    PropertyAddressChanged(PropertyAddressChangedData),

    /// Property was deleted.
    PropertyDeleted(PropertyDeletedData),
}

impl DomainEvent for PropertyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PropertyEvent::PropertyRegistered(_) => "PropertyRegistered",
            PropertyEvent::PropertyRenamed(_) => "PropertyRenamed",
            PropertyEvent::PropertyAddressChanged(_) => "PropertyAddressChanged",
            PropertyEvent::PropertyDeleted(_) => "PropertyDeleted",
        }
    }
}

/// Data for PropertyRegistered event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRegisteredData {
    /// The unique property ID.
    pub property_id: AggregateId,

    /// Owning company.
    pub company_id: AggregateId,

    /// Normalized code, unique per company.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Postal address.
    pub address: Address,

    /// When the property was registered.
    pub registered_at: DateTime<Utc>,
}

/// Data for PropertyRenamed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRenamedData {
    /// The new name.
    pub name: String,
}

/// Data for PropertyAddressChanged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyAddressChangedData {
    /// The new address.
    pub address: Address,
}

/// Data for PropertyDeleted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDeletedData {
    /// When the property was deleted.
    pub deleted_at: DateTime<Utc>,
}

// Convenience constructors for events
impl PropertyEvent {
    /// Creates a PropertyRegistered event.
    pub fn property_registered(
        property_id: AggregateId,
        company_id: AggregateId,
        code: String,
        name: String,
        address: Address,
    ) -> Self {
        PropertyEvent::PropertyRegistered(PropertyRegisteredData {
            property_id,
            company_id,
            code,
            name,
            address,
            registered_at: Utc::now(),
        })
    }

    /// Creates a PropertyRenamed event.
    pub fn property_renamed(name: String) -> Self {
        PropertyEvent::PropertyRenamed(PropertyRenamedData { name })
    }

    /// Creates a PropertyAddressChanged event.
    pub fn property_address_changed(address: Address) -> Self {
        PropertyEvent::PropertyAddressChanged(PropertyAddressChangedData { address })
    }

    /// Creates a PropertyDeleted event.
    pub fn property_deleted() -> Self {
        PropertyEvent::PropertyDeleted(PropertyDeletedData {
            deleted_at: Utc::now(),
        })
    }
}
