//! Integration events: the versioned contracts other services consume.
//!
//! Each contract has a stable `EVENT_TYPE` identifier (stored on the outbox
//! row) and a broker `TOPIC`. Identifiers never change once published; a
//! breaking change gets a new `.vN` contract.

use common::AggregateId;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// A versioned integration event contract.
pub trait IntegrationEventContract: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable identifier, e.g. `companies.registered.v1`.
    const EVENT_TYPE: &'static str;

    /// Broker topic the contract is published on.
    const TOPIC: &'static str;

    /// Wraps the contract in the closed integration event enum.
    fn into_event(self) -> IntegrationEvent;
}

macro_rules! contract {
    ($ty:ident, $event_type:literal, $topic:literal) => {
        impl IntegrationEventContract for $ty {
            const EVENT_TYPE: &'static str = $event_type;
            const TOPIC: &'static str = $topic;

            fn into_event(self) -> IntegrationEvent {
                IntegrationEvent::$ty(self)
            }
        }
    };
}

/// Published when a company is registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRegisteredV1 {
    pub company_id: AggregateId,
    pub code: String,
    pub name: String,
}

/// Published when a company is renamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRenamedV1 {
    pub company_id: AggregateId,
    pub name: String,
}

/// Published when a company is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDeletedV1 {
    pub company_id: AggregateId,
    pub code: String,
}

/// Published when a property is registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRegisteredV1 {
    pub property_id: AggregateId,
    pub company_id: AggregateId,
    pub code: String,
    pub name: String,
}

/// Published when a property is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDeletedV1 {
    pub property_id: AggregateId,
    pub company_id: AggregateId,
}

/// Published when a building is registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingRegisteredV1 {
    pub building_id: AggregateId,
    pub property_id: AggregateId,
    pub code: String,
    pub name: String,
    pub floors: u16,
}

/// Published when a building is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingDeletedV1 {
    pub building_id: AggregateId,
    pub property_id: AggregateId,
}

/// Published when a unit is registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitRegisteredV1 {
    pub unit_id: AggregateId,
    pub building_id: AggregateId,
    pub code: String,
    pub name: String,
}

/// Published when a unit is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitDeletedV1 {
    pub unit_id: AggregateId,
    pub building_id: AggregateId,
}

contract!(CompanyRegisteredV1, "companies.registered.v1", "companies");
contract!(CompanyRenamedV1, "companies.renamed.v1", "companies");
contract!(CompanyDeletedV1, "companies.deleted.v1", "companies");
contract!(PropertyRegisteredV1, "properties.registered.v1", "properties");
contract!(PropertyDeletedV1, "properties.deleted.v1", "properties");
contract!(BuildingRegisteredV1, "buildings.registered.v1", "buildings");
contract!(BuildingDeletedV1, "buildings.deleted.v1", "buildings");
contract!(UnitRegisteredV1, "units.registered.v1", "units");
contract!(UnitDeletedV1, "units.deleted.v1", "units");

/// Every integration event the service publishes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IntegrationEvent {
    CompanyRegisteredV1(CompanyRegisteredV1),
    CompanyRenamedV1(CompanyRenamedV1),
    CompanyDeletedV1(CompanyDeletedV1),
    PropertyRegisteredV1(PropertyRegisteredV1),
    PropertyDeletedV1(PropertyDeletedV1),
    BuildingRegisteredV1(BuildingRegisteredV1),
    BuildingDeletedV1(BuildingDeletedV1),
    UnitRegisteredV1(UnitRegisteredV1),
    UnitDeletedV1(UnitDeletedV1),
}

impl IntegrationEvent {
    /// Returns the stable event type identifier.
    pub fn event_type(&self) -> &'static str {
        match self {
            IntegrationEvent::CompanyRegisteredV1(_) => CompanyRegisteredV1::EVENT_TYPE,
            IntegrationEvent::CompanyRenamedV1(_) => CompanyRenamedV1::EVENT_TYPE,
            IntegrationEvent::CompanyDeletedV1(_) => CompanyDeletedV1::EVENT_TYPE,
            IntegrationEvent::PropertyRegisteredV1(_) => PropertyRegisteredV1::EVENT_TYPE,
            IntegrationEvent::PropertyDeletedV1(_) => PropertyDeletedV1::EVENT_TYPE,
            IntegrationEvent::BuildingRegisteredV1(_) => BuildingRegisteredV1::EVENT_TYPE,
            IntegrationEvent::BuildingDeletedV1(_) => BuildingDeletedV1::EVENT_TYPE,
            IntegrationEvent::UnitRegisteredV1(_) => UnitRegisteredV1::EVENT_TYPE,
            IntegrationEvent::UnitDeletedV1(_) => UnitDeletedV1::EVENT_TYPE,
        }
    }

    /// Returns the broker topic.
    pub fn topic(&self) -> &'static str {
        match self {
            IntegrationEvent::CompanyRegisteredV1(_) => CompanyRegisteredV1::TOPIC,
            IntegrationEvent::CompanyRenamedV1(_) => CompanyRenamedV1::TOPIC,
            IntegrationEvent::CompanyDeletedV1(_) => CompanyDeletedV1::TOPIC,
            IntegrationEvent::PropertyRegisteredV1(_) => PropertyRegisteredV1::TOPIC,
            IntegrationEvent::PropertyDeletedV1(_) => PropertyDeletedV1::TOPIC,
            IntegrationEvent::BuildingRegisteredV1(_) => BuildingRegisteredV1::TOPIC,
            IntegrationEvent::BuildingDeletedV1(_) => BuildingDeletedV1::TOPIC,
            IntegrationEvent::UnitRegisteredV1(_) => UnitRegisteredV1::TOPIC,
            IntegrationEvent::UnitDeletedV1(_) => UnitDeletedV1::TOPIC,
        }
    }

    /// Serializes the contract body for the outbox payload.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
