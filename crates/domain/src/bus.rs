//! Static command routing.
//!
//! Every command is routed to its service method through the
//! `command_routes!` table below. A command without a route does not
//! implement [`Handle`] for [`CommandBus`], so dispatching it fails to
//! compile.

use async_trait::async_trait;
use event_store::EventStore;

use crate::building::{
    BuildingService, ChangeBuildingFloors, DeleteBuilding, RegisterBuilding, RenameBuilding,
};
use crate::command::{Command, CommandContext};
use crate::company::{CompanyService, DeleteCompany, RegisterCompany, RenameCompany};
use crate::error::DomainError;
use crate::property::{
    ChangePropertyAddress, DeleteProperty, PropertyService, RegisterProperty, RenameProperty,
};
use crate::unit::{ChangeUnitDetails, DeleteUnit, RegisterUnit, RenameUnit, UnitService};

/// Handles one command type.
#[async_trait]
pub trait Handle<C: Command>: Send + Sync {
    /// Executes the command in the given context.
    async fn handle(&self, ctx: &CommandContext, command: C) -> Result<C::Output, DomainError>;
}

/// Owns one service per aggregate and routes commands to them.
pub struct CommandBus<S: EventStore> {
    companies: CompanyService<S>,
    properties: PropertyService<S>,
    buildings: BuildingService<S>,
    units: UnitService<S>,
}

impl<S: EventStore + Clone> CommandBus<S> {
    /// Creates a bus whose services share one event store.
    pub fn new(store: S) -> Self {
        Self {
            companies: CompanyService::new(store.clone()),
            properties: PropertyService::new(store.clone()),
            buildings: BuildingService::new(store.clone()),
            units: UnitService::new(store),
        }
    }
}

impl<S: EventStore> CommandBus<S> {
    pub fn companies(&self) -> &CompanyService<S> {
        &self.companies
    }

    pub fn properties(&self) -> &PropertyService<S> {
        &self.properties
    }

    pub fn buildings(&self) -> &BuildingService<S> {
        &self.buildings
    }

    pub fn units(&self) -> &UnitService<S> {
        &self.units
    }

    /// Routes a command to its handler, recording outcome and latency.
    pub async fn dispatch<C>(&self, ctx: &CommandContext, command: C) -> Result<C::Output, DomainError>
    where
        C: Command,
        Self: Handle<C>,
    {
        let start = std::time::Instant::now();
        let aggregate_id = command.aggregate_id();

        let result = self.handle(ctx, command).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::counter!("commands_total", "command" => C::NAME, "outcome" => outcome)
            .increment(1);
        metrics::histogram!("command_duration_seconds", "command" => C::NAME)
            .record(start.elapsed().as_secs_f64());

        if let Err(e) = &result {
            tracing::info!(
                command = C::NAME,
                tenant_id = %ctx.tenant_id,
                %aggregate_id,
                error = %e,
                "Command rejected"
            );
        }
        result
    }
}

macro_rules! command_routes {
    ($($command:ty => $service:ident.$method:ident),+ $(,)?) => {
        impl<S: EventStore> CommandBus<S> {
            /// Names of every routed command.
            pub const COMMANDS: &'static [&'static str] = &[$(<$command as Command>::NAME),+];
        }

        $(
            #[async_trait]
            impl<S: EventStore> Handle<$command> for CommandBus<S> {
                async fn handle(
                    &self,
                    ctx: &CommandContext,
                    command: $command,
                ) -> Result<<$command as Command>::Output, DomainError> {
                    self.$service.$method(ctx, command).await
                }
            }
        )+
    };
}

command_routes! {
    RegisterCompany => companies.register,
    RenameCompany => companies.rename,
    DeleteCompany => companies.delete,
    RegisterProperty => properties.register,
    RenameProperty => properties.rename,
    ChangePropertyAddress => properties.change_address,
    DeleteProperty => properties.delete,
    RegisterBuilding => buildings.register,
    RenameBuilding => buildings.rename,
    ChangeBuildingFloors => buildings.change_floors,
    DeleteBuilding => buildings.delete,
    RegisterUnit => units.register,
    RenameUnit => units.rename,
    ChangeUnitDetails => units.change_details,
    DeleteUnit => units.delete,
}
