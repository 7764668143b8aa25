//! Unit aggregate implementation.

use common::AggregateId;
use event_store::UniqueKey;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::aggregate::{Aggregate, Auditable, Lifecycle};
use crate::command::Changes;
use crate::error::DomainError;
use crate::integration::{
    IntegrationEvent, IntegrationEventContract, UnitDeletedV1, UnitRegisteredV1,
};
use crate::validation::{self, codes};

use super::UnitEvent;

/// Physical description of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitDetails {
    /// Floor number; negative for basements.
    pub floor: i32,

    /// Floor area in square metres.
    pub area_sqm: f64,

    /// Number of rooms.
    pub rooms: u16,
}

impl UnitDetails {
    pub fn new(floor: i32, area_sqm: f64, rooms: u16) -> Self {
        Self {
            floor,
            area_sqm,
            rooms,
        }
    }

    fn validated(self) -> Result<Self, DomainError> {
        if !self.area_sqm.is_finite() || self.area_sqm <= 0.0 {
            return Err(DomainError::violation(
                codes::AREA_INVALID,
                "Area must be a positive number",
            ));
        }
        Ok(self)
    }
}

/// Unit aggregate root. Belongs to one building.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Unit {
    id: Option<AggregateId>,
    building_id: Option<AggregateId>,
    code: String,
    name: String,
    details: UnitDetails,
    lifecycle: Lifecycle,
}

impl Aggregate for Unit {
    type Event = UnitEvent;

    fn aggregate_type() -> &'static str {
        "Unit"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn is_deleted(&self) -> bool {
        self.lifecycle == Lifecycle::Deleted
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UnitEvent::UnitRegistered(data) => {
                self.id = Some(data.unit_id);
                self.building_id = Some(data.building_id);
                self.code = data.code.clone();
                self.name = data.name.clone();
                self.details = data.details;
                self.lifecycle = Lifecycle::Active;
            }
            UnitEvent::UnitRenamed(data) => {
                self.name = data.name.clone();
            }
            UnitEvent::UnitDetailsChanged(data) => {
                self.details = data.details;
            }
            UnitEvent::UnitDeleted(_) => {
                self.lifecycle = Lifecycle::Deleted;
            }
        }
    }

    fn integration_event(&self, event: &Self::Event) -> Option<IntegrationEvent> {
        let unit_id = self.id?;
        let building_id = self.building_id?;
        match event {
            UnitEvent::UnitRegistered(_) => Some(
                UnitRegisteredV1 {
                    unit_id,
                    building_id,
                    code: self.code.clone(),
                    name: self.name.clone(),
                }
                .into_event(),
            ),
            UnitEvent::UnitDeleted(_) => Some(
                UnitDeletedV1 {
                    unit_id,
                    building_id,
                }
                .into_event(),
            ),
            UnitEvent::UnitRenamed(_) | UnitEvent::UnitDetailsChanged(_) => None,
        }
    }
}

impl Auditable for Unit {
    fn audit_data(previous: &Self, event: &Self::Event) -> serde_json::Value {
        match event {
            UnitEvent::UnitRegistered(data) => json!({
                "buildingId": data.building_id,
                "code": data.code,
                "name": data.name,
                "details": data.details,
            }),
            UnitEvent::UnitRenamed(data) => json!({
                "oldName": previous.name,
                "newName": data.name,
            }),
            UnitEvent::UnitDetailsChanged(data) => json!({
                "oldDetails": previous.details,
                "newDetails": data.details,
            }),
            UnitEvent::UnitDeleted(_) => json!({
                "code": previous.code,
                "name": previous.name,
            }),
        }
    }
}

// Query methods
impl Unit {
    pub fn building_id(&self) -> Option<AggregateId> {
        self.building_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn details(&self) -> UnitDetails {
        self.details
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    /// Uniqueness key for a unit code within a building.
    pub fn code_key(building_id: AggregateId, code: &str) -> UniqueKey {
        UniqueKey::new("unit.code", format!("{building_id}/{code}"))
    }
}

// Command methods (return events)
impl Unit {
    /// Registers a new unit.
    pub fn register(
        &self,
        unit_id: AggregateId,
        building_id: AggregateId,
        code: &str,
        name: &str,
        details: UnitDetails,
    ) -> Result<Changes<UnitEvent>, DomainError> {
        self.lifecycle.ensure_new("Unit")?;
        let code = validation::code(code)?;
        let name = validation::name(name)?;
        let details = details.validated()?;

        let key = Self::code_key(building_id, &code);
        Ok(Changes::new(vec![UnitEvent::unit_registered(
            unit_id,
            building_id,
            code,
            name,
            details,
        )])
        .claim(key))
    }

    /// Renames the unit.
    pub fn rename(&self, name: &str) -> Result<Vec<UnitEvent>, DomainError> {
        self.lifecycle.ensure_active("Unit")?;
        let name = validation::name(name)?;
        if name == self.name {
            return Err(DomainError::violation(
                codes::NAME_UNCHANGED,
                "New name equals the current name",
            ));
        }

        Ok(vec![UnitEvent::unit_renamed(name)])
    }

    /// Replaces floor, area and room count.
    pub fn change_details(&self, details: UnitDetails) -> Result<Vec<UnitEvent>, DomainError> {
        self.lifecycle.ensure_active("Unit")?;
        let details = details.validated()?;
        if details == self.details {
            return Err(DomainError::violation(
                codes::DETAILS_UNCHANGED,
                "New details equal the current details",
            ));
        }

        Ok(vec![UnitEvent::unit_details_changed(details)])
    }

    /// Deletes the unit and frees its code.
    pub fn delete(&self) -> Result<Changes<UnitEvent>, DomainError> {
        self.lifecycle.ensure_deletable("Unit")?;

        let mut changes = Changes::new(vec![UnitEvent::unit_deleted()]).archive();
        if let Some(building_id) = self.building_id {
            changes = changes.release(Self::code_key(building_id, &self.code));
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Versioned;

    #[test]
    fn area_must_be_positive() {
        for area in [0.0, -12.5, f64::NAN, f64::INFINITY] {
            let err = Unit::default()
                .register(
                    AggregateId::new(),
                    AggregateId::new(),
                    "1A",
                    "Flat 1A",
                    UnitDetails::new(1, area, 3),
                )
                .unwrap_err();
            assert_eq!(err.violation_code(), Some(codes::AREA_INVALID));
        }
    }

    #[test]
    fn change_details() {
        let changes = Unit::default()
            .register(
                AggregateId::new(),
                AggregateId::new(),
                "1a",
                "Flat 1A",
                UnitDetails::new(1, 54.5, 2),
            )
            .unwrap();
        let mut unit = Versioned::<Unit>::replay(changes.events());
        assert_eq!(unit.state().code(), "1A");

        assert_eq!(
            unit.state()
                .change_details(UnitDetails::new(1, 54.5, 2))
                .unwrap_err()
                .violation_code(),
            Some(codes::DETAILS_UNCHANGED)
        );

        let events = unit
            .state()
            .change_details(UnitDetails::new(-1, 60.0, 3))
            .unwrap();
        let data = Unit::audit_data(unit.state(), &events[0]);
        assert_eq!(data["oldDetails"]["areaSqm"], 54.5);
        assert_eq!(data["newDetails"]["floor"], -1);

        unit.fold(&events[0]);
        assert_eq!(unit.state().details().rooms, 3);
        assert_eq!(unit.version().as_i64(), 2);
    }

    #[test]
    fn deletion_is_published() {
        let changes = Unit::default()
            .register(
                AggregateId::new(),
                AggregateId::new(),
                "1A",
                "Flat 1A",
                UnitDetails::new(0, 30.0, 1),
            )
            .unwrap();
        let mut unit = Versioned::<Unit>::replay(changes.events());

        let deleted = unit.state().delete().unwrap();
        unit.fold(&deleted.events()[0]);
        let event = unit
            .state()
            .integration_event(&deleted.events()[0])
            .unwrap();
        assert_eq!(event.event_type(), "units.deleted.v1");
        assert!(unit.state().is_deleted());
    }
}
