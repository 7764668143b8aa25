//! Company service providing a simplified API for company operations.

use common::AggregateId;
use event_store::EventStore;

use crate::command::{Changes, CommandContext, CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{Company, DeleteCompany, RegisterCompany, RenameCompany};

/// Service for managing companies.
pub struct CompanyService<S: EventStore> {
    handler: CommandHandler<S, Company>,
}

impl<S: EventStore> CompanyService<S> {
    /// Creates a new company service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Company> {
        &self.handler
    }

    /// Registers a new company.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn register(
        &self,
        ctx: &CommandContext,
        cmd: RegisterCompany,
    ) -> Result<CommandResult<Company>, DomainError> {
        let company_id = cmd.company_id;

        self.handler
            .create(ctx, company_id, |company| {
                company.register(company_id, &cmd.code, &cmd.name)
            })
            .await
    }

    /// Renames a company.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn rename(
        &self,
        ctx: &CommandContext,
        cmd: RenameCompany,
    ) -> Result<CommandResult<Company>, DomainError> {
        self.handler
            .execute(ctx, cmd.company_id, |company| {
                company.rename(&cmd.name).map(Changes::from)
            })
            .await
    }

    /// Deletes a company. Deleting twice is rejected with `ALREADY_DELETED`.
    #[tracing::instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn delete(
        &self,
        ctx: &CommandContext,
        cmd: DeleteCompany,
    ) -> Result<CommandResult<Company>, DomainError> {
        self.handler
            .execute_including_deleted(ctx, cmd.company_id, |company| company.delete())
            .await
    }

    /// Gets the current state of a company, including deleted ones.
    pub async fn get(
        &self,
        ctx: &CommandContext,
        company_id: AggregateId,
    ) -> Result<Company, DomainError> {
        Ok(self.handler.load(ctx, company_id).await?.into_state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::TenantId;
    use event_store::InMemoryEventStore;

    use crate::aggregate::Aggregate;
    use crate::validation::codes;

    fn tenant_ctx() -> CommandContext {
        CommandContext::new(TenantId::new()).with_actor("jane@acme.test")
    }

    #[tokio::test]
    async fn test_register_company() {
        let service = CompanyService::new(InMemoryEventStore::new());
        let ctx = tenant_ctx();

        let result = service
            .register(&ctx, RegisterCompany::new("acme", "Acme"))
            .await
            .unwrap();

        assert_eq!(result.aggregate.code(), "ACME");
        assert_eq!(result.new_version.as_i64(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_code_is_conflict() {
        let service = CompanyService::new(InMemoryEventStore::new());
        let ctx = tenant_ctx();
        service
            .register(&ctx, RegisterCompany::new("ACME", "Acme"))
            .await
            .unwrap();

        let result = service
            .register(&ctx, RegisterCompany::new("acme", "Other Acme"))
            .await;
        assert!(matches!(result, Err(DomainError::Conflict(_))));

        // Another tenant may reuse the code
        service
            .register(&tenant_ctx(), RegisterCompany::new("ACME", "Acme"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_code_is_reusable_after_delete() {
        let service = CompanyService::new(InMemoryEventStore::new());
        let ctx = tenant_ctx();
        let first = service
            .register(&ctx, RegisterCompany::new("ACME", "Acme"))
            .await
            .unwrap();
        service
            .delete(&ctx, DeleteCompany::new(first.aggregate_id))
            .await
            .unwrap();

        service
            .register(&ctx, RegisterCompany::new("ACME", "Acme Again"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rename_and_get() {
        let service = CompanyService::new(InMemoryEventStore::new());
        let ctx = tenant_ctx();
        let created = service
            .register(&ctx, RegisterCompany::new("ACME", "Acme"))
            .await
            .unwrap();

        service
            .rename(&ctx, RenameCompany::new(created.aggregate_id, "Acme Corp"))
            .await
            .unwrap();

        let company = service.get(&ctx, created.aggregate_id).await.unwrap();
        assert_eq!(company.name(), "Acme Corp");
    }

    #[tokio::test]
    async fn test_rename_deleted_company_is_not_found() {
        let service = CompanyService::new(InMemoryEventStore::new());
        let ctx = tenant_ctx();
        let created = service
            .register(&ctx, RegisterCompany::new("ACME", "Acme"))
            .await
            .unwrap();
        service
            .delete(&ctx, DeleteCompany::new(created.aggregate_id))
            .await
            .unwrap();

        let result = service
            .rename(&ctx, RenameCompany::new(created.aggregate_id, "Acme Corp"))
            .await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));

        let again = service
            .delete(&ctx, DeleteCompany::new(created.aggregate_id))
            .await;
        assert_eq!(
            again.unwrap_err().violation_code(),
            Some(codes::ALREADY_DELETED)
        );

        // Still readable
        assert!(service.get(&ctx, created.aggregate_id).await.unwrap().is_deleted());
    }
}
