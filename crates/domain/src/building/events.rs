//! Building domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

/// Events that can occur on a building aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BuildingEvent {
    /// Building was registered on a property.
    BuildingRegistered(BuildingRegisteredData),

    /// Building was renamed.
    BuildingRenamed(BuildingRenamedData),

    /// Number of floors was changed.
    BuildingFloorsChanged(BuildingFloorsChangedData),

    /// Building was deleted.
    BuildingDeleted(BuildingDeletedData),
}

impl DomainEvent for BuildingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BuildingEvent::BuildingRegistered(_) => "BuildingRegistered",
            BuildingEvent::BuildingRenamed(_) => "BuildingRenamed",
            BuildingEvent::BuildingFloorsChanged(_) => "BuildingFloorsChanged",
            BuildingEvent::BuildingDeleted(_) => "BuildingDeleted",
        }
    }
}

/// Data for BuildingRegistered event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingRegisteredData {
    pub building_id: AggregateId,
    pub property_id: AggregateId,
    pub code: String,
    pub name: String,
    pub floors: u16,
    pub registered_at: DateTime<Utc>,
}

/// Data for BuildingRenamed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingRenamedData {
    pub name: String,
}

/// Data for BuildingFloorsChanged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingFloorsChangedData {
    pub floors: u16,
}

/// Data for BuildingDeleted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingDeletedData {
    pub deleted_at: DateTime<Utc>,
}

impl BuildingEvent {
    /// Creates a BuildingRegistered event.
    pub fn building_registered(
        building_id: AggregateId,
        property_id: AggregateId,
        code: String,
        name: String,
        floors: u16,
    ) -> Self {
        BuildingEvent::BuildingRegistered(BuildingRegisteredData {
            building_id,
            property_id,
            code,
            name,
            floors,
            registered_at: Utc::now(),
        })
    }

    /// Creates a BuildingRenamed event.
    pub fn building_renamed(name: String) -> Self {
        BuildingEvent::BuildingRenamed(BuildingRenamedData { name })
    }

    /// Creates a BuildingFloorsChanged event.
    pub fn building_floors_changed(floors: u16) -> Self {
        BuildingEvent::BuildingFloorsChanged(BuildingFloorsChangedData { floors })
    }

    /// Creates a BuildingDeleted event.
    pub fn building_deleted() -> Self {
        BuildingEvent::BuildingDeleted(BuildingDeletedData {
            deleted_at: Utc::now(),
        })
    }
}
