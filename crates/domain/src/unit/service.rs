//! Unit service.

use common::AggregateId;
use event_store::EventStore;

use crate::building::Building;
use crate::command::{Changes, CommandContext, CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{ChangeUnitDetails, DeleteUnit, RegisterUnit, RenameUnit, Unit};

/// Service for managing units.
pub struct UnitService<S: EventStore> {
    handler: CommandHandler<S, Unit>,
    buildings: CommandHandler<S, Building>,
}

impl<S: EventStore + Clone> UnitService<S> {
    /// Creates a new unit service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store.clone()),
            buildings: CommandHandler::new(store),
        }
    }
}

impl<S: EventStore> UnitService<S> {
    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Unit> {
        &self.handler
    }

    /// Registers a unit in an active building.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn register(
        &self,
        ctx: &CommandContext,
        cmd: RegisterUnit,
    ) -> Result<CommandResult<Unit>, DomainError> {
        self.buildings.load_parent(ctx, cmd.building_id).await?;

        let unit_id = cmd.unit_id;
        self.handler
            .create(ctx, unit_id, |unit| {
                unit.register(unit_id, cmd.building_id, &cmd.code, &cmd.name, cmd.details)
            })
            .await
    }

    /// Renames a unit.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn rename(
        &self,
        ctx: &CommandContext,
        cmd: RenameUnit,
    ) -> Result<CommandResult<Unit>, DomainError> {
        self.handler
            .execute(ctx, cmd.unit_id, |unit| unit.rename(&cmd.name).map(Changes::from))
            .await
    }

    /// Changes floor, area or room count.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn change_details(
        &self,
        ctx: &CommandContext,
        cmd: ChangeUnitDetails,
    ) -> Result<CommandResult<Unit>, DomainError> {
        self.handler
            .execute(ctx, cmd.unit_id, |unit| {
                unit.change_details(cmd.details).map(Changes::from)
            })
            .await
    }

    /// Deletes a unit.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn delete(
        &self,
        ctx: &CommandContext,
        cmd: DeleteUnit,
    ) -> Result<CommandResult<Unit>, DomainError> {
        self.handler
            .execute_including_deleted(ctx, cmd.unit_id, |unit| unit.delete())
            .await
    }

    /// Gets the current state of a unit, including deleted ones.
    pub async fn get(
        &self,
        ctx: &CommandContext,
        unit_id: AggregateId,
    ) -> Result<Unit, DomainError> {
        Ok(self.handler.load(ctx, unit_id).await?.into_state())
    }
}
