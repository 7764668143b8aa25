//! Property aggregate implementation.

use common::AggregateId;
use event_store::UniqueKey;
use serde_json::json;

use crate::aggregate::{Aggregate, Auditable, Lifecycle};
use crate::command::Changes;
use crate::error::DomainError;
use crate::integration::{
    IntegrationEvent, IntegrationEventContract, PropertyDeletedV1, PropertyRegisteredV1,
};
use crate::validation::{self, codes};

use super::{Address, PropertyEvent};

/// Property aggregate root. Belongs to one company.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Property {
    id: Option<AggregateId>,
    company_id: Option<AggregateId>,
    code: String,
    name: String,
    address: Option<Address>,
    lifecycle: Lifecycle,
}

impl Aggregate for Property {
    type Event = PropertyEvent;

    fn aggregate_type() -> &'static str {
        "Property"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn is_deleted(&self) -> bool {
        self.lifecycle == Lifecycle::Deleted
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PropertyEvent::PropertyRegistered(data) => {
                self.id = Some(data.property_id);
                self.company_id = Some(data.company_id);
                self.code = data.code.clone();
                self.name = data.name.clone();
                self.address = Some(data.address.clone());
                self.lifecycle = Lifecycle::Active;
            }
            PropertyEvent::PropertyRenamed(data) => {
                self.name = data.name.clone();
            }
            PropertyEvent::PropertyAddressChanged(data) => {
                self.address = Some(data.address.clone());
            }
            PropertyEvent::PropertyDeleted(_) => {
                self.lifecycle = Lifecycle::Deleted;
            }
        }
    }

    fn integration_event(&self, event: &Self::Event) -> Option<IntegrationEvent> {
        let property_id = self.id?;
        let company_id = self.company_id?;
        match event {
            PropertyEvent::PropertyRegistered(_) => Some(
                PropertyRegisteredV1 {
                    property_id,
                    company_id,
                    code: self.code.clone(),
                    name: self.name.clone(),
                }
                .into_event(),
            ),
            PropertyEvent::PropertyDeleted(_) => Some(
                PropertyDeletedV1 {
                    property_id,
                    company_id,
                }
                .into_event(),
            ),
            PropertyEvent::PropertyRenamed(_) | PropertyEvent::PropertyAddressChanged(_) => None,
        }
    }
}

impl Auditable for Property {
    fn audit_data(previous: &Self, event: &Self::Event) -> serde_json::Value {
        match event {
            PropertyEvent::PropertyRegistered(data) => json!({
                "companyId": data.company_id,
                "code": data.code,
                "name": data.name,
                "address": data.address,
            }),
            PropertyEvent::PropertyRenamed(data) => json!({
                "oldName": previous.name,
                "newName": data.name,
            }),
            PropertyEvent::PropertyAddressChanged(data) => json!({
                "oldAddress": previous.address,
                "newAddress": data.address,
            }),
            PropertyEvent::PropertyDeleted(_) => json!({
                "code": previous.code,
                "name": previous.name,
            }),
        }
    }
}

// Query methods
impl Property {
    /// Returns the owning company.
    pub fn company_id(&self) -> Option<AggregateId> {
        self.company_id
    }

    /// Returns the normalized property code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the postal address.
    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    /// Returns the lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Returns true if the property accepts operations.
    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    /// Uniqueness key for a property code within a company.
    pub fn code_key(company_id: AggregateId, code: &str) -> UniqueKey {
        UniqueKey::new("property.code", format!("{company_id}/{code}"))
    }
}

// Command methods (return events)
impl Property {
    /// Registers a new property under an active company.
    pub fn register(
        &self,
        property_id: AggregateId,
        company_id: AggregateId,
        code: &str,
        name: &str,
        address: &Address,
    ) -> Result<Changes<PropertyEvent>, DomainError> {
        self.lifecycle.ensure_new("Property")?;
        let code = validation::code(code)?;
        let name = validation::name(name)?;
        let address = address.validated()?;

        let key = Self::code_key(company_id, &code);
        Ok(Changes::new(vec![PropertyEvent::property_registered(
            property_id,
            company_id,
            code,
            name,
            address,
        )])
        .claim(key))
    }

    /// Renames the property.
    pub fn rename(&self, name: &str) -> Result<Vec<PropertyEvent>, DomainError> {
        self.lifecycle.ensure_active("Property")?;
        let name = validation::name(name)?;
        if name == self.name {
            return Err(DomainError::violation(
                codes::NAME_UNCHANGED,
                "New name equals the current name",
            ));
        }

        Ok(vec![PropertyEvent::property_renamed(name)])
    }

    /// Changes the postal address.
    pub fn change_address(&self, address: &Address) -> Result<Vec<PropertyEvent>, DomainError> {
        self.lifecycle.ensure_active("Property")?;
        let address = address.validated()?;
        if self.address.as_ref() == Some(&address) {
            return Err(DomainError::violation(
                codes::ADDRESS_UNCHANGED,
                "New address equals the current address",
            ));
        }

        Ok(vec![PropertyEvent::property_address_changed(address)])
    }

    /// Deletes the property and frees its code.
    pub fn delete(&self) -> Result<Changes<PropertyEvent>, DomainError> {
        self.lifecycle.ensure_deletable("Property")?;

        let mut changes = Changes::new(vec![PropertyEvent::property_deleted()]).archive();
        if let Some(company_id) = self.company_id {
            changes = changes.release(Self::code_key(company_id, &self.code));
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Versioned;

    fn address() -> Address {
        Address::new("Main St 1", "Springfield", "12345", "US")
    }

    fn registered() -> Versioned<Property> {
        let changes = Property::default()
            .register(
                AggregateId::new(),
                AggregateId::new(),
                "hq",
                "Headquarters",
                &address(),
            )
            .unwrap();
        Versioned::replay(changes.events())
    }

    #[test]
    fn register_sets_parent_and_address() {
        let property = registered();
        assert!(property.state().is_active());
        assert_eq!(property.state().code(), "HQ");
        assert_eq!(property.state().address(), Some(&address()));
        assert!(property.state().company_id().is_some());
    }

    #[test]
    fn code_key_is_scoped_by_company() {
        let a = AggregateId::new();
        let b = AggregateId::new();
        assert_ne!(Property::code_key(a, "HQ"), Property::code_key(b, "HQ"));
    }

    #[test]
    fn change_address_requires_a_difference() {
        let property = registered();
        assert_eq!(
            property
                .state()
                .change_address(&address())
                .unwrap_err()
                .violation_code(),
            Some(codes::ADDRESS_UNCHANGED)
        );

        let moved = Address::new("Elm St 2", "Springfield", "12345", "US");
        let events = property.state().change_address(&moved).unwrap();
        let data = Property::audit_data(property.state(), &events[0]);
        assert_eq!(data["oldAddress"]["street"], "Main St 1");
        assert_eq!(data["newAddress"]["street"], "Elm St 2");
    }

    #[test]
    fn only_registration_and_deletion_are_published() {
        let mut property = registered();
        let renamed = PropertyEvent::property_renamed("Head Office".to_string());
        property.fold(&renamed);
        assert!(property.state().integration_event(&renamed).is_none());

        let changes = property.state().delete().unwrap();
        property.fold(&changes.events()[0]);
        let published = property
            .state()
            .integration_event(&changes.events()[0])
            .unwrap();
        assert_eq!(published.event_type(), "properties.deleted.v1");
    }
}
