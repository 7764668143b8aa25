//! Company commands.

use common::AggregateId;

use crate::command::{Command, CommandResult};

use super::Company;

/// Command to register a new company.
#[derive(Debug, Clone)]
pub struct RegisterCompany {
    /// The company ID to create.
    pub company_id: AggregateId,

    /// Requested code; normalized to upper case.
    pub code: String,

    /// Display name.
    pub name: String,
}

impl RegisterCompany {
    /// Creates a RegisterCompany command with a generated company ID.
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            company_id: AggregateId::new(),
            code: code.into(),
            name: name.into(),
        }
    }
}

impl Command for RegisterCompany {
    const NAME: &'static str = "company.register";
    type Output = CommandResult<Company>;

    fn aggregate_id(&self) -> AggregateId {
        self.company_id
    }
}

/// Command to rename a company.
#[derive(Debug, Clone)]
pub struct RenameCompany {
    /// The company to rename.
    pub company_id: AggregateId,

    /// The new name.
    pub name: String,
}

impl RenameCompany {
    /// Creates a new RenameCompany command.
    pub fn new(company_id: AggregateId, name: impl Into<String>) -> Self {
        Self {
            company_id,
            name: name.into(),
        }
    }
}

impl Command for RenameCompany {
    const NAME: &'static str = "company.rename";
    type Output = CommandResult<Company>;

    fn aggregate_id(&self) -> AggregateId {
        self.company_id
    }
}

/// Command to delete a company.
#[derive(Debug, Clone)]
pub struct DeleteCompany {
    /// The company to delete.
    pub company_id: AggregateId,
}

impl DeleteCompany {
    /// Creates a new DeleteCompany command.
    pub fn new(company_id: AggregateId) -> Self {
        Self { company_id }
    }
}

impl Command for DeleteCompany {
    const NAME: &'static str = "company.delete";
    type Output = CommandResult<Company>;

    fn aggregate_id(&self) -> AggregateId {
        self.company_id
    }
}
