//! Command handling infrastructure.

use std::future::Future;
use std::marker::PhantomData;

use common::{AggregateId, TenantId};
use event_store::{AppendRequest, EventEnvelope, EventStore, OutboxMessage, UniqueKey, Version};
use tokio_util::sync::CancellationToken;

use crate::aggregate::{Aggregate, DomainEvent, Versioned};
use crate::error::DomainError;
use crate::validation::codes;

/// Metadata key under which the correlation id is stored.
pub const CORRELATION_ID_KEY: &str = "correlation_id";

/// Who is issuing a command, for which tenant, and how to abort it.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Tenant whose streams the command may touch.
    pub tenant_id: TenantId,

    /// Authenticated caller, recorded on every event.
    pub actor: Option<String>,

    /// Ties the events of one request together; stored in envelope metadata.
    pub correlation_id: Option<String>,

    /// Fires when the caller gives up on the command.
    pub cancellation: CancellationToken,
}

impl CommandContext {
    /// Creates a context for a tenant with no actor.
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            actor: None,
            correlation_id: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Sets the actor.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Sets the correlation id.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Sets the cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Runs `fut` unless the context is cancelled first.
    ///
    /// A cancelled store call is dropped before it commits, which rolls back
    /// its transaction.
    pub async fn guard<F, T, E>(&self, fut: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, E>>,
        DomainError: From<E>,
    {
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(DomainError::Cancelled),
            result = fut => result.map_err(DomainError::from),
        }
    }
}

/// What a domain decision wants to persist.
#[derive(Debug, Clone)]
pub struct Changes<E> {
    events: Vec<E>,
    claim: Vec<UniqueKey>,
    release: Vec<UniqueKey>,
    archive: bool,
}

impl<E> Changes<E> {
    /// Creates a change set with the given events.
    pub fn new(events: Vec<E>) -> Self {
        Self {
            events,
            claim: Vec::new(),
            release: Vec::new(),
            archive: false,
        }
    }

    /// Claims a unique key for the aggregate.
    pub fn claim(mut self, key: UniqueKey) -> Self {
        self.claim.push(key);
        self
    }

    /// Releases a unique key held by the aggregate.
    pub fn release(mut self, key: UniqueKey) -> Self {
        self.release.push(key);
        self
    }

    /// Marks the stream archived.
    pub fn archive(mut self) -> Self {
        self.archive = true;
        self
    }

    /// Returns the events.
    pub fn events(&self) -> &[E] {
        &self.events
    }
}

impl<E> From<Vec<E>> for Changes<E> {
    fn from(events: Vec<E>) -> Self {
        Self::new(events)
    }
}

/// A request to change one aggregate.
///
/// `NAME` is the stable identifier the command bus registers it under.
pub trait Command: Send + Sync + std::fmt::Debug + 'static {
    /// Stable command name, e.g. `company.rename`.
    const NAME: &'static str;

    /// What a successful command returns.
    type Output: Send;

    /// Returns the ID of the aggregate this command targets.
    fn aggregate_id(&self) -> AggregateId;
}

/// Result of command execution.
#[derive(Debug, Clone)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate the command targeted.
    pub aggregate_id: AggregateId,

    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The new version of the aggregate after the command.
    pub new_version: Version,
}

/// Handler for executing commands against aggregates.
///
/// The handler is responsible for:
/// 1. Loading the aggregate from the event store
/// 2. Running uniqueness pre-checks
/// 3. Executing the decision to produce events
/// 4. Persisting events, outbox rows and key changes in one append
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> Clone for CommandHandler<S, A>
where
    S: EventStore + Clone,
    A: Aggregate,
{
    fn clone(&self) -> Self {
        Self::new(self.store.clone())
    }
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    /// Creates a new command handler with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn not_found(aggregate_id: AggregateId) -> DomainError {
        DomainError::NotFound {
            aggregate_type: A::aggregate_type(),
            aggregate_id,
        }
    }

    /// Loads an aggregate by replaying its stream, deleted or not.
    ///
    /// Fails with `NotFound` when the stream is missing or belongs to a
    /// different aggregate type.
    pub async fn load(
        &self,
        ctx: &CommandContext,
        aggregate_id: AggregateId,
    ) -> Result<Versioned<A>, DomainError> {
        let envelopes = match ctx
            .guard(self.store.fetch_stream(ctx.tenant_id, aggregate_id))
            .await
        {
            Ok(envelopes) => envelopes,
            Err(DomainError::NotFound { .. }) => return Err(Self::not_found(aggregate_id)),
            Err(e) => return Err(e),
        };

        if envelopes
            .iter()
            .any(|e| e.aggregate_type != A::aggregate_type())
        {
            return Err(Self::not_found(aggregate_id));
        }

        Versioned::from_envelopes(&envelopes)
    }

    /// Loads an aggregate that has not been deleted.
    pub async fn load_live(
        &self,
        ctx: &CommandContext,
        aggregate_id: AggregateId,
    ) -> Result<Versioned<A>, DomainError> {
        let aggregate = self.load(ctx, aggregate_id).await?;
        if aggregate.state().is_deleted() {
            return Err(Self::not_found(aggregate_id));
        }
        Ok(aggregate)
    }

    /// Loads the aggregate a new child is being attached to.
    ///
    /// A missing parent is `NotFound`; a deleted one is `PARENT_DELETED`.
    pub async fn load_parent(
        &self,
        ctx: &CommandContext,
        aggregate_id: AggregateId,
    ) -> Result<Versioned<A>, DomainError> {
        let parent = self.load(ctx, aggregate_id).await?;
        if parent.state().is_deleted() {
            return Err(DomainError::violation(
                codes::PARENT_DELETED,
                format!("{} {aggregate_id} is deleted", A::aggregate_type()),
            ));
        }
        Ok(parent)
    }

    /// Starts a new stream from a decision made on the empty aggregate.
    pub async fn create<F>(
        &self,
        ctx: &CommandContext,
        aggregate_id: AggregateId,
        decide: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Changes<A::Event>, DomainError>,
    {
        let initial = Versioned::<A>::new();
        let changes = decide(initial.state())?;

        self.precheck_keys(ctx, aggregate_id, &changes).await?;

        let (request, aggregate, events) = self.prepare(ctx, aggregate_id, initial, changes)?;
        let new_version = ctx.guard(self.store.start_stream(request)).await?;
        self.record_append(&events);

        Ok(CommandResult {
            aggregate_id,
            aggregate: aggregate.into_state(),
            events,
            new_version,
        })
    }

    /// Executes a decision against a live aggregate and persists the result.
    ///
    /// Deleted aggregates are reported as `NotFound`. On a concurrency
    /// conflict the aggregate is reloaded and the decision re-run once.
    pub async fn execute<F>(
        &self,
        ctx: &CommandContext,
        aggregate_id: AggregateId,
        decide: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Changes<A::Event>, DomainError>,
    {
        self.execute_with(ctx, aggregate_id, false, decide).await
    }

    /// Like [`execute`](Self::execute) but lets the decision see deleted
    /// aggregates, so it can reject them with its own rule.
    pub async fn execute_including_deleted<F>(
        &self,
        ctx: &CommandContext,
        aggregate_id: AggregateId,
        decide: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Changes<A::Event>, DomainError>,
    {
        self.execute_with(ctx, aggregate_id, true, decide).await
    }

    async fn execute_with<F>(
        &self,
        ctx: &CommandContext,
        aggregate_id: AggregateId,
        include_deleted: bool,
        decide: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Changes<A::Event>, DomainError>,
    {
        let mut retried = false;
        loop {
            let current = if include_deleted {
                self.load(ctx, aggregate_id).await?
            } else {
                self.load_live(ctx, aggregate_id).await?
            };
            let current_version = current.version();

            let changes = decide(current.state())?;
            if changes.events.is_empty() {
                return Ok(CommandResult {
                    aggregate_id,
                    aggregate: current.into_state(),
                    events: vec![],
                    new_version: current_version,
                });
            }

            self.precheck_keys(ctx, aggregate_id, &changes).await?;

            let (request, aggregate, events) = self.prepare(ctx, aggregate_id, current, changes)?;
            match ctx.guard(self.store.append(request)).await {
                Ok(new_version) => {
                    self.record_append(&events);
                    return Ok(CommandResult {
                        aggregate_id,
                        aggregate: aggregate.into_state(),
                        events,
                        new_version,
                    });
                }
                Err(DomainError::ConcurrencyConflict { .. }) if !retried => {
                    tracing::debug!(
                        %aggregate_id,
                        expected = %current_version,
                        "Concurrency conflict, reloading and retrying once"
                    );
                    metrics::counter!("command_conflict_retries_total", "aggregate_type" => A::aggregate_type())
                        .increment(1);
                    retried = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Rejects key claims already held by another aggregate.
    ///
    /// The store enforces the same rule inside the append; this only gives
    /// the common case a clean error before anything is written.
    async fn precheck_keys(
        &self,
        ctx: &CommandContext,
        aggregate_id: AggregateId,
        changes: &Changes<A::Event>,
    ) -> Result<(), DomainError> {
        for key in &changes.claim {
            let owner = ctx
                .guard(self.store.unique_key_owner(ctx.tenant_id, key))
                .await?;
            if let Some(owner) = owner
                && owner != aggregate_id
            {
                return Err(DomainError::Conflict(format!(
                    "{} '{}' is already in use",
                    key.scope, key.value
                )));
            }
        }
        Ok(())
    }

    /// Builds the append request and the state it will produce.
    #[allow(clippy::type_complexity)]
    fn prepare(
        &self,
        ctx: &CommandContext,
        aggregate_id: AggregateId,
        current: Versioned<A>,
        changes: Changes<A::Event>,
    ) -> Result<(AppendRequest, Versioned<A>, Vec<A::Event>), DomainError> {
        let expected_version = current.version();
        let mut next = current;
        let mut envelopes = Vec::with_capacity(changes.events.len());
        let mut outbox = Vec::new();

        for event in &changes.events {
            next.fold(event);
            let mut builder = EventEnvelope::builder()
                .tenant_id(ctx.tenant_id)
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(next.version())
                .actor(ctx.actor.clone());
            if let Some(correlation_id) = &ctx.correlation_id {
                builder = builder.metadata(
                    CORRELATION_ID_KEY,
                    serde_json::Value::String(correlation_id.clone()),
                );
            }
            let envelope = builder.payload(event)?.build();

            if let Some(integration) = next.state().integration_event(event) {
                outbox.push(OutboxMessage::new(
                    ctx.tenant_id,
                    integration.topic(),
                    integration.event_type(),
                    integration.encode()?,
                    envelope.timestamp,
                ));
            }
            envelopes.push(envelope);
        }

        let mut request = AppendRequest::new(ctx.tenant_id, aggregate_id, expected_version)
            .events(envelopes)
            .outbox(outbox);
        for key in changes.claim {
            request = request.claim_key(key);
        }
        for key in changes.release {
            request = request.release_key(key);
        }
        if changes.archive {
            request = request.archive();
        }

        Ok((request, next, changes.events))
    }

    fn record_append(&self, events: &[A::Event]) {
        metrics::counter!("event_store_appends_total", "aggregate_type" => A::aggregate_type())
            .increment(1);
        tracing::debug!(
            aggregate_type = A::aggregate_type(),
            events = events.len(),
            "Persisted command events"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Lifecycle;
    use crate::integration::{CompanyRenamedV1, IntegrationEvent, IntegrationEventContract};
    use event_store::{EventStoreExt, InMemoryEventStore, OutboxStatus, OutboxStore};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "type", content = "data")]
    enum TestEvent {
        Created { id: AggregateId, name: String },
        Renamed { name: String },
        Removed,
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Created { .. } => "TestCreated",
                TestEvent::Renamed { .. } => "TestRenamed",
                TestEvent::Removed => "TestRemoved",
            }
        }
    }

    #[derive(Debug, Default, Clone)]
    struct TestAggregate {
        id: Option<AggregateId>,
        name: String,
        lifecycle: Lifecycle,
    }

    impl Aggregate for TestAggregate {
        type Event = TestEvent;

        fn aggregate_type() -> &'static str {
            "TestAggregate"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn is_deleted(&self) -> bool {
            self.lifecycle == Lifecycle::Deleted
        }

        fn apply(&mut self, event: &Self::Event) {
            match event {
                TestEvent::Created { id, name } => {
                    self.id = Some(*id);
                    self.name = name.clone();
                    self.lifecycle = Lifecycle::Active;
                }
                TestEvent::Renamed { name } => self.name = name.clone(),
                TestEvent::Removed => self.lifecycle = Lifecycle::Deleted,
            }
        }

        fn integration_event(&self, event: &Self::Event) -> Option<IntegrationEvent> {
            match event {
                TestEvent::Renamed { .. } => Some(
                    CompanyRenamedV1 {
                        company_id: self.id?,
                        name: self.name.clone(),
                    }
                    .into_event(),
                ),
                TestEvent::Created { .. } | TestEvent::Removed => None,
            }
        }
    }

    fn created(id: AggregateId) -> Changes<TestEvent> {
        Changes::new(vec![TestEvent::Created {
            id,
            name: "Test".to_string(),
        }])
    }

    #[tokio::test]
    async fn create_starts_stream() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store.clone());
        let ctx = CommandContext::new(TenantId::new()).with_actor("jane");
        let id = AggregateId::new();

        let result = handler.create(&ctx, id, |_| Ok(created(id))).await.unwrap();

        assert_eq!(result.new_version, Version::first());
        assert_eq!(result.aggregate.name, "Test");
        let stored = store.fetch_stream(ctx.tenant_id, id).await.unwrap();
        assert_eq!(stored[0].actor.as_deref(), Some("jane"));
        assert_eq!(stored[0].event_type, "TestCreated");
    }

    #[tokio::test]
    async fn correlation_id_is_stored_in_metadata() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store.clone());
        let ctx = CommandContext::new(TenantId::new()).with_correlation_id("req-42");
        let id = AggregateId::new();

        handler.create(&ctx, id, |_| Ok(created(id))).await.unwrap();
        handler
            .execute(&ctx, id, |_| {
                Ok(Changes::new(vec![TestEvent::Renamed {
                    name: "Other".to_string(),
                }]))
            })
            .await
            .unwrap();

        let stored = store.fetch_stream(ctx.tenant_id, id).await.unwrap();
        assert_eq!(stored.len(), 2);
        for envelope in &stored {
            assert_eq!(
                envelope.metadata.get(CORRELATION_ID_KEY),
                Some(&serde_json::json!("req-42"))
            );
        }
    }

    #[tokio::test]
    async fn metadata_is_empty_without_correlation_id() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store.clone());
        let ctx = CommandContext::new(TenantId::new());
        let id = AggregateId::new();

        handler.create(&ctx, id, |_| Ok(created(id))).await.unwrap();

        let stored = store.fetch_stream(ctx.tenant_id, id).await.unwrap();
        assert!(stored[0].metadata.is_empty());
    }

    #[tokio::test]
    async fn create_twice_is_a_conflict() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store);
        let ctx = CommandContext::new(TenantId::new());
        let id = AggregateId::new();

        handler.create(&ctx, id, |_| Ok(created(id))).await.unwrap();
        let result = handler.create(&ctx, id, |_| Ok(created(id))).await;

        assert!(matches!(result, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn execute_writes_outbox_for_integration_events() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store.clone());
        let ctx = CommandContext::new(TenantId::new());
        let id = AggregateId::new();
        handler.create(&ctx, id, |_| Ok(created(id))).await.unwrap();

        let result = handler
            .execute(&ctx, id, |_| {
                Ok(Changes::new(vec![TestEvent::Renamed {
                    name: "Renamed".to_string(),
                }]))
            })
            .await
            .unwrap();

        assert_eq!(result.new_version, Version::new(2));
        let pending = store
            .list_messages(ctx.tenant_id, OutboxStatus::Pending, 10)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_type, "companies.renamed.v1");
        let body: serde_json::Value = serde_json::from_slice(&pending[0].payload).unwrap();
        assert_eq!(body["name"], "Renamed");
    }

    #[tokio::test]
    async fn execute_on_missing_or_deleted_is_not_found() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store);
        let ctx = CommandContext::new(TenantId::new());
        let id = AggregateId::new();

        let missing = handler
            .execute(&ctx, id, |_| Ok(Changes::new(vec![TestEvent::Removed])))
            .await;
        assert!(matches!(missing, Err(DomainError::NotFound { .. })));

        handler.create(&ctx, id, |_| Ok(created(id))).await.unwrap();
        handler
            .execute(&ctx, id, |_| Ok(Changes::new(vec![TestEvent::Removed])))
            .await
            .unwrap();

        let deleted = handler
            .execute(&ctx, id, |_| Ok(Changes::new(vec![TestEvent::Removed])))
            .await;
        assert!(matches!(deleted, Err(DomainError::NotFound { .. })));

        // The including-deleted path hands the decision the deleted state
        let seen = handler
            .execute_including_deleted(&ctx, id, |agg| {
                assert!(agg.is_deleted());
                Err(DomainError::violation("ALREADY_DELETED", "gone"))
            })
            .await;
        assert_eq!(seen.unwrap_err().violation_code(), Some("ALREADY_DELETED"));
    }

    #[tokio::test]
    async fn empty_decision_persists_nothing() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store.clone());
        let ctx = CommandContext::new(TenantId::new());
        let id = AggregateId::new();
        handler.create(&ctx, id, |_| Ok(created(id))).await.unwrap();

        let result = handler
            .execute(&ctx, id, |_| Ok(Changes::new(vec![])))
            .await
            .unwrap();

        assert!(result.events.is_empty());
        assert_eq!(result.new_version, Version::first());
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_writer_is_absorbed_by_one_retry() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store.clone());
        let ctx = CommandContext::new(TenantId::new());
        let id = AggregateId::new();
        handler.create(&ctx, id, |_| Ok(created(id))).await.unwrap();

        let interloper = store.clone();
        let tenant = ctx.tenant_id;
        let calls = std::sync::atomic::AtomicUsize::new(0);

        let result = handler
            .execute(&ctx, id, |agg| {
                // The first decision races a write that lands before it appends
                if calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                    let interloper = interloper.clone();
                    let version = Version::new(2);
                    let envelope = EventEnvelope::builder()
                        .tenant_id(tenant)
                        .aggregate_id(id)
                        .aggregate_type("TestAggregate")
                        .event_type("TestRenamed")
                        .version(version)
                        .payload(&TestEvent::Renamed {
                            name: "Other".to_string(),
                        })
                        .unwrap()
                        .build();
                    block_on(interloper.append(
                        AppendRequest::new(tenant, id, Version::first()).events(vec![envelope]),
                    ));
                }
                Ok(Changes::new(vec![TestEvent::Renamed {
                    name: format!("{}!", agg.name),
                }]))
            })
            .await
            .unwrap();

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(result.new_version, Version::new(3));
        assert_eq!(result.aggregate.name, "Other!");
        assert_eq!(
            store.stream_version(tenant, id).await.unwrap(),
            Some(Version::new(3))
        );
    }

    fn block_on<F: Future>(fut: F) -> F::Output {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
    }

    #[tokio::test]
    async fn cancelled_context_writes_nothing() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(store.clone());
        let token = CancellationToken::new();
        token.cancel();
        let ctx = CommandContext::new(TenantId::new()).with_cancellation(token);
        let id = AggregateId::new();

        let result = handler.create(&ctx, id, |_| Ok(created(id))).await;

        assert!(matches!(result, Err(DomainError::Cancelled)));
        assert_eq!(store.event_count().await, 0);
    }
}
