//! Company aggregate implementation.

use common::AggregateId;
use event_store::UniqueKey;
use serde_json::json;

use crate::aggregate::{Aggregate, Auditable, Lifecycle};
use crate::command::Changes;
use crate::error::DomainError;
use crate::integration::{
    CompanyDeletedV1, CompanyRegisteredV1, CompanyRenamedV1, IntegrationEvent,
    IntegrationEventContract,
};
use crate::validation::{self, codes};

use super::CompanyEvent;

/// Company aggregate root.
///
/// The top of the ownership tree; properties belong to a company.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Company {
    id: Option<AggregateId>,
    code: String,
    name: String,
    lifecycle: Lifecycle,
}

impl Aggregate for Company {
    type Event = CompanyEvent;

    fn aggregate_type() -> &'static str {
        "Company"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn is_deleted(&self) -> bool {
        self.lifecycle == Lifecycle::Deleted
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CompanyEvent::CompanyRegistered(data) => {
                self.id = Some(data.company_id);
                self.code = data.code.clone();
                self.name = data.name.clone();
                self.lifecycle = Lifecycle::Active;
            }
            CompanyEvent::CompanyRenamed(data) => {
                self.name = data.name.clone();
            }
            CompanyEvent::CompanyDeleted(_) => {
                self.lifecycle = Lifecycle::Deleted;
            }
        }
    }

    fn integration_event(&self, event: &Self::Event) -> Option<IntegrationEvent> {
        let company_id = self.id?;
        let contract = match event {
            CompanyEvent::CompanyRegistered(_) => CompanyRegisteredV1 {
                company_id,
                code: self.code.clone(),
                name: self.name.clone(),
            }
            .into_event(),
            CompanyEvent::CompanyRenamed(_) => CompanyRenamedV1 {
                company_id,
                name: self.name.clone(),
            }
            .into_event(),
            CompanyEvent::CompanyDeleted(_) => CompanyDeletedV1 {
                company_id,
                code: self.code.clone(),
            }
            .into_event(),
        };
        Some(contract)
    }
}

impl Auditable for Company {
    fn audit_data(previous: &Self, event: &Self::Event) -> serde_json::Value {
        match event {
            CompanyEvent::CompanyRegistered(data) => json!({
                "code": data.code,
                "name": data.name,
            }),
            CompanyEvent::CompanyRenamed(data) => json!({
                "oldName": previous.name,
                "newName": data.name,
            }),
            CompanyEvent::CompanyDeleted(_) => json!({
                "code": previous.code,
                "name": previous.name,
            }),
        }
    }
}

// Query methods
impl Company {
    /// Returns the normalized company code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Returns true if the company accepts operations.
    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    /// Uniqueness key for a company code within the tenant.
    pub fn code_key(code: &str) -> UniqueKey {
        UniqueKey::new("company.code", code)
    }
}

// Command methods (return events)
impl Company {
    /// Registers a new company.
    pub fn register(
        &self,
        company_id: AggregateId,
        code: &str,
        name: &str,
    ) -> Result<Changes<CompanyEvent>, DomainError> {
        self.lifecycle.ensure_new("Company")?;
        let code = validation::code(code)?;
        let name = validation::name(name)?;

        let key = Self::code_key(&code);
        Ok(
            Changes::new(vec![CompanyEvent::company_registered(company_id, code, name)])
                .claim(key),
        )
    }

    /// Renames the company.
    pub fn rename(&self, name: &str) -> Result<Vec<CompanyEvent>, DomainError> {
        self.lifecycle.ensure_active("Company")?;
        let name = validation::name(name)?;
        if name == self.name {
            return Err(DomainError::violation(
                codes::NAME_UNCHANGED,
                "New name equals the current name",
            ));
        }

        Ok(vec![CompanyEvent::company_renamed(name)])
    }

    /// Deletes the company and frees its code.
    pub fn delete(&self) -> Result<Changes<CompanyEvent>, DomainError> {
        self.lifecycle.ensure_deletable("Company")?;

        Ok(Changes::new(vec![CompanyEvent::company_deleted()])
            .release(Self::code_key(&self.code))
            .archive())
    }
}
