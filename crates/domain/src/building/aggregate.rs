//! Building aggregate implementation.

use common::AggregateId;
use event_store::UniqueKey;
use serde_json::json;

use crate::aggregate::{Aggregate, Auditable, Lifecycle};
use crate::command::Changes;
use crate::error::DomainError;
use crate::integration::{
    BuildingDeletedV1, BuildingRegisteredV1, IntegrationEvent, IntegrationEventContract,
};
use crate::validation::{self, codes};

use super::BuildingEvent;

/// Fewest floors a building may have.
pub const MIN_FLOORS: u16 = 1;

/// Most floors a building may have.
pub const MAX_FLOORS: u16 = 200;

/// Building aggregate root. Belongs to one property.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Building {
    id: Option<AggregateId>,
    property_id: Option<AggregateId>,
    code: String,
    name: String,
    floors: u16,
    lifecycle: Lifecycle,
}

impl Aggregate for Building {
    type Event = BuildingEvent;

    fn aggregate_type() -> &'static str {
        "Building"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn is_deleted(&self) -> bool {
        self.lifecycle == Lifecycle::Deleted
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BuildingEvent::BuildingRegistered(data) => {
                self.id = Some(data.building_id);
                self.property_id = Some(data.property_id);
                self.code = data.code.clone();
                self.name = data.name.clone();
                self.floors = data.floors;
                self.lifecycle = Lifecycle::Active;
            }
            BuildingEvent::BuildingRenamed(data) => {
                self.name = data.name.clone();
            }
            BuildingEvent::BuildingFloorsChanged(data) => {
                self.floors = data.floors;
            }
            BuildingEvent::BuildingDeleted(_) => {
                self.lifecycle = Lifecycle::Deleted;
            }
        }
    }

    fn integration_event(&self, event: &Self::Event) -> Option<IntegrationEvent> {
        let building_id = self.id?;
        let property_id = self.property_id?;
        match event {
            BuildingEvent::BuildingRegistered(_) => Some(
                BuildingRegisteredV1 {
                    building_id,
                    property_id,
                    code: self.code.clone(),
                    name: self.name.clone(),
                    floors: self.floors,
                }
                .into_event(),
            ),
            BuildingEvent::BuildingDeleted(_) => Some(
                BuildingDeletedV1 {
                    building_id,
                    property_id,
                }
                .into_event(),
            ),
            BuildingEvent::BuildingRenamed(_) | BuildingEvent::BuildingFloorsChanged(_) => None,
        }
    }
}

impl Auditable for Building {
    fn audit_data(previous: &Self, event: &Self::Event) -> serde_json::Value {
        match event {
            BuildingEvent::BuildingRegistered(data) => json!({
                "propertyId": data.property_id,
                "code": data.code,
                "name": data.name,
                "floors": data.floors,
            }),
            BuildingEvent::BuildingRenamed(data) => json!({
                "oldName": previous.name,
                "newName": data.name,
            }),
            BuildingEvent::BuildingFloorsChanged(data) => json!({
                "oldFloors": previous.floors,
                "newFloors": data.floors,
            }),
            BuildingEvent::BuildingDeleted(_) => json!({
                "code": previous.code,
                "name": previous.name,
            }),
        }
    }
}

fn validate_floors(floors: u16) -> Result<u16, DomainError> {
    if !(MIN_FLOORS..=MAX_FLOORS).contains(&floors) {
        return Err(DomainError::violation(
            codes::FLOORS_OUT_OF_RANGE,
            format!("Floors must be between {MIN_FLOORS} and {MAX_FLOORS}"),
        ));
    }
    Ok(floors)
}

// Query methods
impl Building {
    pub fn property_id(&self) -> Option<AggregateId> {
        self.property_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn floors(&self) -> u16 {
        self.floors
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    /// Uniqueness key for a building code within a property.
    pub fn code_key(property_id: AggregateId, code: &str) -> UniqueKey {
        UniqueKey::new("building.code", format!("{property_id}/{code}"))
    }
}

// Command methods (return events)
impl Building {
    /// Registers a new building.
    pub fn register(
        &self,
        building_id: AggregateId,
        property_id: AggregateId,
        code: &str,
        name: &str,
        floors: u16,
    ) -> Result<Changes<BuildingEvent>, DomainError> {
        self.lifecycle.ensure_new("Building")?;
        let code = validation::code(code)?;
        let name = validation::name(name)?;
        let floors = validate_floors(floors)?;

        let key = Self::code_key(property_id, &code);
        Ok(Changes::new(vec![BuildingEvent::building_registered(
            building_id,
            property_id,
            code,
            name,
            floors,
        )])
        .claim(key))
    }

    /// Renames the building.
    pub fn rename(&self, name: &str) -> Result<Vec<BuildingEvent>, DomainError> {
        self.lifecycle.ensure_active("Building")?;
        let name = validation::name(name)?;
        if name == self.name {
            return Err(DomainError::violation(
                codes::NAME_UNCHANGED,
                "New name equals the current name",
            ));
        }

        Ok(vec![BuildingEvent::building_renamed(name)])
    }

    /// Changes the number of floors.
    pub fn change_floors(&self, floors: u16) -> Result<Vec<BuildingEvent>, DomainError> {
        self.lifecycle.ensure_active("Building")?;
        let floors = validate_floors(floors)?;
        if floors == self.floors {
            return Err(DomainError::violation(
                codes::FLOORS_UNCHANGED,
                format!("Building already has {floors} floors"),
            ));
        }

        Ok(vec![BuildingEvent::building_floors_changed(floors)])
    }

    /// Deletes the building and frees its code.
    pub fn delete(&self) -> Result<Changes<BuildingEvent>, DomainError> {
        self.lifecycle.ensure_deletable("Building")?;

        let mut changes = Changes::new(vec![BuildingEvent::building_deleted()]).archive();
        if let Some(property_id) = self.property_id {
            changes = changes.release(Self::code_key(property_id, &self.code));
        }
        Ok(changes)
    }
}
