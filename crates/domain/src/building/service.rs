//! Building service.

use common::AggregateId;
use event_store::EventStore;

use crate::command::{Changes, CommandContext, CommandHandler, CommandResult};
use crate::error::DomainError;
use crate::property::Property;

use super::{Building, ChangeBuildingFloors, DeleteBuilding, RegisterBuilding, RenameBuilding};

/// Service for managing buildings.
pub struct BuildingService<S: EventStore> {
    handler: CommandHandler<S, Building>,
    properties: CommandHandler<S, Property>,
}

impl<S: EventStore + Clone> BuildingService<S> {
    /// Creates a new building service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store.clone()),
            properties: CommandHandler::new(store),
        }
    }
}

impl<S: EventStore> BuildingService<S> {
    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Building> {
        &self.handler
    }

    /// Registers a building on an active property.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn register(
        &self,
        ctx: &CommandContext,
        cmd: RegisterBuilding,
    ) -> Result<CommandResult<Building>, DomainError> {
        self.properties.load_parent(ctx, cmd.property_id).await?;

        let building_id = cmd.building_id;
        self.handler
            .create(ctx, building_id, |building| {
                building.register(
                    building_id,
                    cmd.property_id,
                    &cmd.code,
                    &cmd.name,
                    cmd.floors,
                )
            })
            .await
    }

    /// Renames a building.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn rename(
        &self,
        ctx: &CommandContext,
        cmd: RenameBuilding,
    ) -> Result<CommandResult<Building>, DomainError> {
        self.handler
            .execute(ctx, cmd.building_id, |building| {
                building.rename(&cmd.name).map(Changes::from)
            })
            .await
    }

    /// Changes the number of floors.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn change_floors(
        &self,
        ctx: &CommandContext,
        cmd: ChangeBuildingFloors,
    ) -> Result<CommandResult<Building>, DomainError> {
        self.handler
            .execute(ctx, cmd.building_id, |building| {
                building.change_floors(cmd.floors).map(Changes::from)
            })
            .await
    }

    /// Deletes a building.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn delete(
        &self,
        ctx: &CommandContext,
        cmd: DeleteBuilding,
    ) -> Result<CommandResult<Building>, DomainError> {
        self.handler
            .execute_including_deleted(ctx, cmd.building_id, |building| building.delete())
            .await
    }

    /// Gets the current state of a building, including deleted ones.
    pub async fn get(
        &self,
        ctx: &CommandContext,
        building_id: AggregateId,
    ) -> Result<Building, DomainError> {
        Ok(self.handler.load(ctx, building_id).await?.into_state())
    }
}
