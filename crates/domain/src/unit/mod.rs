//! Unit aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;

pub use aggregate::{Unit, UnitDetails};
pub use commands::{ChangeUnitDetails, DeleteUnit, RegisterUnit, RenameUnit};
pub use events::{
    UnitDeletedData, UnitDetailsChangedData, UnitEvent, UnitRegisteredData, UnitRenamedData,
};
pub use service::UnitService;
