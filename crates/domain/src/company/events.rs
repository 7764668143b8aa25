//! Company domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

/// Events that can occur on a company aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CompanyEvent {
    /// Company was registered.
    CompanyRegistered(CompanyRegisteredData),

    /// Company was renamed.
    CompanyRenamed(CompanyRenamedData),

    /// Company was deleted.
    CompanyDeleted(CompanyDeletedData),
}

impl DomainEvent for CompanyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CompanyEvent::CompanyRegistered(_) => "CompanyRegistered",
            CompanyEvent::CompanyRenamed(_) => "CompanyRenamed",
            CompanyEvent::CompanyDeleted(_) => "CompanyDeleted",
        }
    }
}

/// Data for CompanyRegistered event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRegisteredData {
    /// The unique company ID.
    pub company_id: AggregateId,

    /// Normalized company code, unique per tenant.
    pub code: String,

    /// Display name.
    pub name: String,

    /// When the company was registered.
    pub registered_at: DateTime<Utc>,
}

/// Data for CompanyRenamed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRenamedData {
    /// The new name.
    pub name: String,
}

/// Data for CompanyDeleted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyDeletedData {
    /// When the company was deleted.
    pub deleted_at: DateTime<Utc>,
}

// Convenience constructors for events
impl CompanyEvent {
    /// Creates a CompanyRegistered event.
    pub fn company_registered(company_id: AggregateId, code: String, name: String) -> Self {
        CompanyEvent::CompanyRegistered(CompanyRegisteredData {
            company_id,
            code,
            name,
            registered_at: Utc::now(),
        })
    }

    /// Creates a CompanyRenamed event.
    pub fn company_renamed(name: String) -> Self {
        CompanyEvent::CompanyRenamed(CompanyRenamedData { name })
    }

    /// Creates a CompanyDeleted event.
    pub fn company_deleted() -> Self {
        CompanyEvent::CompanyDeleted(CompanyDeletedData {
            deleted_at: Utc::now(),
        })
    }
}
