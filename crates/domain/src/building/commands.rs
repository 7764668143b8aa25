//! Building commands.

use common::AggregateId;

use crate::command::{Command, CommandResult};

use super::Building;

/// Command to register a building on a property.
#[derive(Debug, Clone)]
pub struct RegisterBuilding {
    pub building_id: AggregateId,
    pub property_id: AggregateId,
    pub code: String,
    pub name: String,
    pub floors: u16,
}

impl RegisterBuilding {
    /// Creates a RegisterBuilding command with a generated building ID.
    pub fn new(
        property_id: AggregateId,
        code: impl Into<String>,
        name: impl Into<String>,
        floors: u16,
    ) -> Self {
        Self {
            building_id: AggregateId::new(),
            property_id,
            code: code.into(),
            name: name.into(),
            floors,
        }
    }
}

impl Command for RegisterBuilding {
    const NAME: &'static str = "building.register";
    type Output = CommandResult<Building>;

    fn aggregate_id(&self) -> AggregateId {
        self.building_id
    }
}

/// Command to rename a building.
#[derive(Debug, Clone)]
pub struct RenameBuilding {
    pub building_id: AggregateId,
    pub name: String,
}

impl RenameBuilding {
    pub fn new(building_id: AggregateId, name: impl Into<String>) -> Self {
        Self {
            building_id,
            name: name.into(),
        }
    }
}

impl Command for RenameBuilding {
    const NAME: &'static str = "building.rename";
    type Output = CommandResult<Building>;

    fn aggregate_id(&self) -> AggregateId {
        self.building_id
    }
}

/// Command to change the number of floors.
#[derive(Debug, Clone)]
pub struct ChangeBuildingFloors {
    pub building_id: AggregateId,
    pub floors: u16,
}

impl ChangeBuildingFloors {
    pub fn new(building_id: AggregateId, floors: u16) -> Self {
        Self {
            building_id,
            floors,
        }
    }
}

impl Command for ChangeBuildingFloors {
    const NAME: &'static str = "building.change_floors";
    type Output = CommandResult<Building>;

    fn aggregate_id(&self) -> AggregateId {
        self.building_id
    }
}

/// Command to delete a building.
#[derive(Debug, Clone)]
pub struct DeleteBuilding {
    pub building_id: AggregateId,
}

impl DeleteBuilding {
    pub fn new(building_id: AggregateId) -> Self {
        Self { building_id }
    }
}

impl Command for DeleteBuilding {
    const NAME: &'static str = "building.delete";
    type Output = CommandResult<Building>;

    fn aggregate_id(&self) -> AggregateId {
        self.building_id
    }
}
