//! Property service.

use common::AggregateId;
use event_store::EventStore;

use crate::command::{Changes, CommandContext, CommandHandler, CommandResult};
use crate::company::Company;
use crate::error::DomainError;

use super::{ChangePropertyAddress, DeleteProperty, Property, RegisterProperty, RenameProperty};

/// Service for managing properties.
pub struct PropertyService<S: EventStore> {
    handler: CommandHandler<S, Property>,
    companies: CommandHandler<S, Company>,
}

impl<S: EventStore + Clone> PropertyService<S> {
    /// Creates a new property service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store.clone()),
            companies: CommandHandler::new(store),
        }
    }
}

impl<S: EventStore> PropertyService<S> {
    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Property> {
        &self.handler
    }

    /// Registers a property under an active company.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn register(
        &self,
        ctx: &CommandContext,
        cmd: RegisterProperty,
    ) -> Result<CommandResult<Property>, DomainError> {
        self.companies.load_parent(ctx, cmd.company_id).await?;

        let property_id = cmd.property_id;
        self.handler
            .create(ctx, property_id, |property| {
                property.register(
                    property_id,
                    cmd.company_id,
                    &cmd.code,
                    &cmd.name,
                    &cmd.address,
                )
            })
            .await
    }

    /// Renames a property.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn rename(
        &self,
        ctx: &CommandContext,
        cmd: RenameProperty,
    ) -> Result<CommandResult<Property>, DomainError> {
        self.handler
            .execute(ctx, cmd.property_id, |property| {
                property.rename(&cmd.name).map(Changes::from)
            })
            .await
    }

    /// Changes a property's address.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn change_address(
        &self,
        ctx: &CommandContext,
        cmd: ChangePropertyAddress,
    ) -> Result<CommandResult<Property>, DomainError> {
        self.handler
            .execute(ctx, cmd.property_id, |property| {
                property.change_address(&cmd.address).map(Changes::from)
            })
            .await
    }

    /// Deletes a property.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn delete(
        &self,
        ctx: &CommandContext,
        cmd: DeleteProperty,
    ) -> Result<CommandResult<Property>, DomainError> {
        self.handler
            .execute_including_deleted(ctx, cmd.property_id, |property| property.delete())
            .await
    }

    /// Gets the current state of a property, including deleted ones.
    pub async fn get(
        &self,
        ctx: &CommandContext,
        property_id: AggregateId,
    ) -> Result<Property, DomainError> {
        Ok(self.handler.load(ctx, property_id).await?.into_state())
    }
}
