//! Domain layer for the property-management core.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits for event-sourced entities
//! - CommandHandler and the CommandBus for command processing
//! - Company, Property, Building and Unit aggregates
//! - Versioned integration event contracts written to the outbox
//! - Audit log reconstruction from event history

pub mod aggregate;
pub mod audit;
pub mod building;
pub mod bus;
pub mod command;
pub mod company;
pub mod error;
pub mod integration;
pub mod property;
pub mod unit;
pub mod validation;

pub use aggregate::{Aggregate, Auditable, DomainEvent, Lifecycle, Versioned};
pub use audit::{AuditLog, AuditLogEntry, AuditReconstructor};
pub use building::{
    Building, BuildingEvent, BuildingService, ChangeBuildingFloors, DeleteBuilding,
    RegisterBuilding, RenameBuilding,
};
pub use bus::{CommandBus, Handle};
pub use command::{
    CORRELATION_ID_KEY, Changes, Command, CommandContext, CommandHandler, CommandResult,
};
pub use company::{
    Company, CompanyEvent, CompanyService, DeleteCompany, RegisterCompany, RenameCompany,
};
pub use error::{BusinessViolation, DomainError};
pub use integration::{IntegrationEvent, IntegrationEventContract};
pub use property::{
    Address, ChangePropertyAddress, DeleteProperty, Property, PropertyEvent, PropertyService,
    RegisterProperty, RenameProperty,
};
pub use unit::{
    ChangeUnitDetails, DeleteUnit, RegisterUnit, RenameUnit, Unit, UnitDetails, UnitEvent,
    UnitService,
};
