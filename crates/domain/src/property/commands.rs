//! Property commands.

use common::AggregateId;

use crate::command::{Command, CommandResult};

use super::{Address, Property};

/// Command to register a property under a company.
#[derive(Debug, Clone)]
pub struct RegisterProperty {
    /// The property ID to create.
    pub property_id: AggregateId,

    /// Owning company; must be active.
    pub company_id: AggregateId,

    /// Requested code; unique within the company.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Postal address.
    pub address: Address,
}

impl RegisterProperty {
    /// Creates a RegisterProperty command with a generated property ID.
    pub fn new(
        company_id: AggregateId,
        code: impl Into<String>,
        name: impl Into<String>,
        address: Address,
    ) -> Self {
        Self {
            property_id: AggregateId::new(),
            company_id,
            code: code.into(),
            name: name.into(),
            address,
        }
    }
}

impl Command for RegisterProperty {
    const NAME: &'static str = "property.register";
    type Output = CommandResult<Property>;

    fn aggregate_id(&self) -> AggregateId {
        self.property_id
    }
}

/// Command to rename a property.
#[derive(Debug, Clone)]
pub struct RenameProperty {
    pub property_id: AggregateId,
    pub name: String,
}

impl RenameProperty {
    /// Creates a new RenameProperty command.
    pub fn new(property_id: AggregateId, name: impl Into<String>) -> Self {
        Self {
            property_id,
            name: name.into(),
        }
    }
}

impl Command for RenameProperty {
    const NAME: &'static str = "property.rename";
    type Output = CommandResult<Property>;

    fn aggregate_id(&self) -> AggregateId {
        self.property_id
    }
}

/// Command to change a property's address.
#[derive(Debug, Clone)]
pub struct ChangePropertyAddress {
    pub property_id: AggregateId,
    pub address: Address,
}

impl ChangePropertyAddress {
    /// Creates a new ChangePropertyAddress command.
    pub fn new(property_id: AggregateId, address: Address) -> Self {
        Self {
            property_id,
            address,
        }
    }
}

impl Command for ChangePropertyAddress {
    const NAME: &'static str = "property.change_address";
    type Output = CommandResult<Property>;

    fn aggregate_id(&self) -> AggregateId {
        self.property_id
    }
}

/// Command to delete a property.
#[derive(Debug, Clone)]
pub struct DeleteProperty {
    pub property_id: AggregateId,
}

impl DeleteProperty {
    /// Creates a new DeleteProperty command.
    pub fn new(property_id: AggregateId) -> Self {
        Self { property_id }
    }
}

impl Command for DeleteProperty {
    const NAME: &'static str = "property.delete";
    type Output = CommandResult<Property>;

    fn aggregate_id(&self) -> AggregateId {
        self.property_id
    }
}
