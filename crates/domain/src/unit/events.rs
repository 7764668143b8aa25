//! Unit domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::UnitDetails;

/// Events that can occur on a unit aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum UnitEvent {
    /// Unit was registered in a building.
    UnitRegistered(UnitRegisteredData),

    /// Unit was renamed.
    UnitRenamed(UnitRenamedData),

    /// Floor, area or room count changed.
    UnitDetailsChanged(UnitDetailsChangedData),

    /// Unit was deleted.
    UnitDeleted(UnitDeletedData),
}

impl DomainEvent for UnitEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UnitEvent::UnitRegistered(_) => "UnitRegistered",
            UnitEvent::UnitRenamed(_) => "UnitRenamed",
            UnitEvent::UnitDetailsChanged(_) => "UnitDetailsChanged",
            UnitEvent::UnitDeleted(_) => "UnitDeleted",
        }
    }
}

/// Data for UnitRegistered event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRegisteredData {
    pub unit_id: AggregateId,
    pub building_id: AggregateId,
    pub code: String,
    pub name: String,
    pub details: UnitDetails,
    pub registered_at: DateTime<Utc>,
}

/// Data for UnitRenamed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRenamedData {
    pub name: String,
}

/// Data for UnitDetailsChanged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDetailsChangedData {
    pub details: UnitDetails,
}

/// Data for UnitDeleted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDeletedData {
    pub deleted_at: DateTime<Utc>,
}

impl UnitEvent {
    /// Creates a UnitRegistered event.
    pub fn unit_registered(
        unit_id: AggregateId,
        building_id: AggregateId,
        code: String,
        name: String,
        details: UnitDetails,
    ) -> Self {
        UnitEvent::UnitRegistered(UnitRegisteredData {
            unit_id,
            building_id,
            code,
            name,
            details,
            registered_at: Utc::now(),
        })
    }

    /// Creates a UnitRenamed event.
    pub fn unit_renamed(name: String) -> Self {
        UnitEvent::UnitRenamed(UnitRenamedData { name })
    }

    /// Creates a UnitDetailsChanged event.
    pub fn unit_details_changed(details: UnitDetails) -> Self {
        UnitEvent::UnitDetailsChanged(UnitDetailsChangedData { details })
    }

    /// Creates a UnitDeleted event.
    pub fn unit_deleted() -> Self {
        UnitEvent::UnitDeleted(UnitDeletedData {
            deleted_at: Utc::now(),
        })
    }
}
