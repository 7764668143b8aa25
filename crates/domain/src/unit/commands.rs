//! Unit commands.

use common::AggregateId;

use crate::command::{Command, CommandResult};

use super::{Unit, UnitDetails};

/// Command to register a unit in a building.
#[derive(Debug, Clone)]
pub struct RegisterUnit {
    pub unit_id: AggregateId,
    pub building_id: AggregateId,
    pub code: String,
    pub name: String,
    pub details: UnitDetails,
}

impl RegisterUnit {
    /// Creates a RegisterUnit command with a generated unit ID.
    pub fn new(
        building_id: AggregateId,
        code: impl Into<String>,
        name: impl Into<String>,
        details: UnitDetails,
    ) -> Self {
        Self {
            unit_id: AggregateId::new(),
            building_id,
            code: code.into(),
            name: name.into(),
            details,
        }
    }
}

impl Command for RegisterUnit {
    const NAME: &'static str = "unit.register";
    type Output = CommandResult<Unit>;

    fn aggregate_id(&self) -> AggregateId {
        self.unit_id
    }
}

/// Command to rename a unit.
#[derive(Debug, Clone)]
pub struct RenameUnit {
    pub unit_id: AggregateId,
    pub name: String,
}

impl RenameUnit {
    pub fn new(unit_id: AggregateId, name: impl Into<String>) -> Self {
        Self {
            unit_id,
            name: name.into(),
        }
    }
}

impl Command for RenameUnit {
    const NAME: &'static str = "unit.rename";
    type Output = CommandResult<Unit>;

    fn aggregate_id(&self) -> AggregateId {
        self.unit_id
    }
}

/// Command to change a unit's floor, area or room count.
#[derive(Debug, Clone)]
pub struct ChangeUnitDetails {
    pub unit_id: AggregateId,
    pub details: UnitDetails,
}

impl ChangeUnitDetails {
    pub fn new(unit_id: AggregateId, details: UnitDetails) -> Self {
        Self { unit_id, details }
    }
}

impl Command for ChangeUnitDetails {
    const NAME: &'static str = "unit.change_details";
    type Output = CommandResult<Unit>;

    fn aggregate_id(&self) -> AggregateId {
        self.unit_id
    }
}

/// Command to delete a unit.
#[derive(Debug, Clone)]
pub struct DeleteUnit {
    pub unit_id: AggregateId,
}

impl DeleteUnit {
    pub fn new(unit_id: AggregateId) -> Self {
        Self { unit_id }
    }
}

impl Command for DeleteUnit {
    const NAME: &'static str = "unit.delete";
    type Output = CommandResult<Unit>;

    fn aggregate_id(&self) -> AggregateId {
        self.unit_id
    }
}
