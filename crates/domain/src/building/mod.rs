//! Building aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;

pub use aggregate::{Building, MAX_FLOORS, MIN_FLOORS};
pub use commands::{ChangeBuildingFloors, DeleteBuilding, RegisterBuilding, RenameBuilding};
pub use events::{
    BuildingDeletedData, BuildingEvent, BuildingFloorsChangedData, BuildingRegisteredData,
    BuildingRenamedData,
};
pub use service::BuildingService;
