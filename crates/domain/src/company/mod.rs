//! Company aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;

pub use aggregate::Company;
pub use commands::{DeleteCompany, RegisterCompany, RenameCompany};
pub use events::{CompanyDeletedData, CompanyEvent, CompanyRegisteredData, CompanyRenamedData};
pub use service::CompanyService;
