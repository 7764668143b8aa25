//! Property aggregate and related types.

mod address;
mod aggregate;
mod commands;
mod events;
mod service;

pub use address::Address;
pub use aggregate::Property;
pub use commands::{ChangePropertyAddress, DeleteProperty, RegisterProperty, RenameProperty};
pub use events::{
    PropertyAddressChangedData, PropertyDeletedData, PropertyEvent, PropertyRegisteredData,
    PropertyRenamedData,
};
pub use service::PropertyService;
