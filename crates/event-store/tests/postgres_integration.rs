//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p event-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use event_store::{
    AggregateId, AppendRequest, ClaimRequest, EventEnvelope, EventStore, EventStoreError,
    EventStoreExt, OutboxMessage, OutboxStatus, OutboxStore, PostgresEventStore, TenantFilter,
    TenantId, UniqueKey, Version,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            // Run migrations using raw_sql to execute multiple statements
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_event_store.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresEventStore {
    let info = get_container_info().await;

    // Create a fresh pool for each test to avoid connection issues
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query("TRUNCATE TABLE events, event_streams, unique_keys, outbox_messages")
        .execute(&pool)
        .await
        .unwrap();

    PostgresEventStore::new(pool)
}

fn create_test_event(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    version: Version,
    event_type: &str,
) -> EventEnvelope {
    EventEnvelope::builder()
        .tenant_id(tenant_id)
        .aggregate_id(aggregate_id)
        .aggregate_type("TestAggregate")
        .event_type(event_type)
        .version(version)
        .actor(Some("tester".to_string()))
        .payload_raw(serde_json::json!({"test": true}))
        .build()
}

fn outbox_row(tenant_id: TenantId) -> OutboxMessage {
    OutboxMessage::new(
        tenant_id,
        "companies",
        "companies.registered.v1",
        br#"{"name":"Acme"}"#.to_vec(),
        Utc::now(),
    )
}

async fn start(store: &PostgresEventStore, tenant_id: TenantId, outbox: Vec<OutboxMessage>) -> AggregateId {
    let aggregate_id = AggregateId::new();
    store
        .start_stream(
            AppendRequest::start(tenant_id, aggregate_id)
                .events(vec![create_test_event(
                    tenant_id,
                    aggregate_id,
                    Version::first(),
                    "Created",
                )])
                .outbox(outbox),
        )
        .await
        .unwrap();
    aggregate_id
}

#[tokio::test]
#[serial]
async fn start_stream_and_fetch() {
    let store = get_test_store().await;
    let tenant = TenantId::new();
    let aggregate_id = AggregateId::new();

    let events = vec![
        create_test_event(tenant, aggregate_id, Version::new(1), "Event1"),
        create_test_event(tenant, aggregate_id, Version::new(2), "Event2"),
    ];
    let result = store
        .start_stream(AppendRequest::start(tenant, aggregate_id).events(events))
        .await;
    assert_eq!(result.unwrap(), Version::new(2));

    let stored = store.fetch_stream(tenant, aggregate_id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].event_type, "Event1");
    assert_eq!(stored[0].actor.as_deref(), Some("tester"));
    assert_eq!(stored[1].version, Version::new(2));

    let info = store.stream_info(tenant, aggregate_id).await.unwrap().unwrap();
    assert_eq!(info.aggregate_type, "TestAggregate");
    assert_eq!(info.version, Version::new(2));
    assert!(!info.archived);
}

#[tokio::test]
#[serial]
async fn start_existing_stream_fails() {
    let store = get_test_store().await;
    let tenant = TenantId::new();
    let aggregate_id = start(&store, tenant, vec![]).await;

    let result = store
        .start_stream(AppendRequest::start(tenant, aggregate_id).events(vec![
            create_test_event(tenant, aggregate_id, Version::first(), "Again"),
        ]))
        .await;

    assert!(matches!(
        result,
        Err(EventStoreError::StreamAlreadyExists(_))
    ));
    assert_eq!(store.fetch_stream(tenant, aggregate_id).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn optimistic_concurrency_conflict() {
    let store = get_test_store().await;
    let tenant = TenantId::new();
    let aggregate_id = start(&store, tenant, vec![]).await;

    store
        .append(
            AppendRequest::new(tenant, aggregate_id, Version::first()).events(vec![
                create_test_event(tenant, aggregate_id, Version::new(2), "Event2"),
            ]),
        )
        .await
        .unwrap();

    let result = store
        .append(
            AppendRequest::new(tenant, aggregate_id, Version::first())
                .events(vec![create_test_event(
                    tenant,
                    aggregate_id,
                    Version::new(2),
                    "Stale",
                )])
                .outbox(vec![outbox_row(tenant)]),
        )
        .await;

    match result {
        Err(EventStoreError::ConcurrencyConflict {
            expected, actual, ..
        }) => {
            assert_eq!(expected, Version::first());
            assert_eq!(actual, Version::new(2));
        }
        other => panic!("Expected ConcurrencyConflict, got {other:?}"),
    }

    assert_eq!(store.fetch_stream(tenant, aggregate_id).await.unwrap().len(), 2);
    assert!(
        store
            .list_messages(tenant, OutboxStatus::Pending, 10)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
#[serial]
async fn append_to_missing_stream_fails() {
    let store = get_test_store().await;
    let tenant = TenantId::new();
    let aggregate_id = AggregateId::new();

    let result = store
        .append(
            AppendRequest::new(tenant, aggregate_id, Version::first()).events(vec![
                create_test_event(tenant, aggregate_id, Version::new(2), "Event2"),
            ]),
        )
        .await;

    assert!(matches!(result, Err(EventStoreError::StreamNotFound(_))));
}

#[tokio::test]
#[serial]
async fn streams_are_partitioned_by_tenant() {
    let store = get_test_store().await;
    let tenant = TenantId::new();
    let aggregate_id = start(&store, tenant, vec![]).await;

    let other = TenantId::new();
    assert!(matches!(
        store.fetch_stream(other, aggregate_id).await,
        Err(EventStoreError::StreamNotFound(_))
    ));
    assert!(!store.stream_exists(other, aggregate_id).await.unwrap());
    assert_eq!(
        store.stream_version(tenant, aggregate_id).await.unwrap(),
        Some(Version::first())
    );
}

#[tokio::test]
#[serial]
async fn unique_keys_are_claimed_and_released() {
    let store = get_test_store().await;
    let tenant = TenantId::new();
    let key = UniqueKey::new("company.code", "ACME");
    let first = AggregateId::new();

    store
        .start_stream(
            AppendRequest::start(tenant, first)
                .events(vec![create_test_event(tenant, first, Version::first(), "Created")])
                .claim_key(key.clone()),
        )
        .await
        .unwrap();

    let second = AggregateId::new();
    let result = store
        .start_stream(
            AppendRequest::start(tenant, second)
                .events(vec![create_test_event(tenant, second, Version::first(), "Created")])
                .claim_key(key.clone()),
        )
        .await;
    assert!(matches!(
        result,
        Err(EventStoreError::UniqueKeyViolation { .. })
    ));
    // The losing stream was rolled back with the key claim
    assert!(!store.stream_exists(tenant, second).await.unwrap());

    store
        .append(
            AppendRequest::new(tenant, first, Version::first())
                .events(vec![create_test_event(tenant, first, Version::new(2), "Deleted")])
                .release_key(key.clone())
                .archive(),
        )
        .await
        .unwrap();

    assert_eq!(store.unique_key_owner(tenant, &key).await.unwrap(), None);
    assert!(store.stream_info(tenant, first).await.unwrap().unwrap().archived);
}

#[tokio::test]
#[serial]
async fn failed_outbox_insert_rolls_back_events() {
    let store = get_test_store().await;
    let tenant = TenantId::new();
    let row = outbox_row(tenant);
    start(&store, tenant, vec![row.clone()]).await;

    // Reusing an outbox id makes the outbox insert fail after the events
    let aggregate_id = AggregateId::new();
    let result = store
        .start_stream(
            AppendRequest::start(tenant, aggregate_id)
                .events(vec![create_test_event(
                    tenant,
                    aggregate_id,
                    Version::first(),
                    "Created",
                )])
                .outbox(vec![row]),
        )
        .await;

    assert!(matches!(result, Err(EventStoreError::Database(_))));
    assert!(!store.stream_exists(tenant, aggregate_id).await.unwrap());
    assert!(store.fetch_stream(tenant, aggregate_id).await.is_err());
}

#[tokio::test]
#[serial]
async fn claim_publish_and_requeue() {
    let store = get_test_store().await;
    let tenant = TenantId::new();
    start(&store, tenant, vec![outbox_row(tenant)]).await;
    start(&store, tenant, vec![outbox_row(tenant)]).await;

    let claimed = store
        .claim_pending(&ClaimRequest::new("worker-a", 10, Duration::seconds(30)))
        .await
        .unwrap();
    assert_eq!(claimed.len(), 2);
    assert!(claimed.iter().all(|m| m.attempts == 1));
    assert_eq!(claimed[0].payload, br#"{"name":"Acme"}"#.to_vec());

    // Leased rows are invisible to other workers
    let none = store
        .claim_pending(&ClaimRequest::new("worker-b", 10, Duration::seconds(30)))
        .await
        .unwrap();
    assert!(none.is_empty());

    store
        .mark_published(tenant, claimed[0].id, "worker-a", Utc::now())
        .await
        .unwrap();
    store
        .mark_failed(tenant, claimed[1].id, "worker-a", "broker rejected")
        .await
        .unwrap();

    let lost = store
        .mark_published(tenant, claimed[1].id, "worker-a", Utc::now())
        .await;
    assert!(matches!(
        lost,
        Err(EventStoreError::InvalidOutboxTransition { .. })
    ));

    let failed = store
        .list_messages(tenant, OutboxStatus::Failed, 10)
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].last_error.as_deref(), Some("broker rejected"));

    store.requeue_failed(tenant, failed[0].id).await.unwrap();
    let requeued = store.get_message(tenant, failed[0].id).await.unwrap().unwrap();
    assert_eq!(requeued.status, OutboxStatus::Pending);
    assert_eq!(requeued.attempts, 0);
}

#[tokio::test]
#[serial]
async fn wrong_worker_cannot_complete_lease() {
    let store = get_test_store().await;
    let tenant = TenantId::new();
    start(&store, tenant, vec![outbox_row(tenant)]).await;

    let claimed = store
        .claim_pending(&ClaimRequest::new("worker-a", 1, Duration::seconds(30)))
        .await
        .unwrap();

    let result = store
        .mark_published(tenant, claimed[0].id, "worker-b", Utc::now())
        .await;
    assert!(matches!(result, Err(EventStoreError::OutboxLeaseLost(_))));
}

#[tokio::test]
#[serial]
async fn retry_is_delayed_until_due() {
    let store = get_test_store().await;
    let tenant = TenantId::new();
    start(&store, tenant, vec![outbox_row(tenant)]).await;

    let claimed = store
        .claim_pending(&ClaimRequest::new("worker-a", 1, Duration::seconds(30)))
        .await
        .unwrap();
    store
        .schedule_retry(
            tenant,
            claimed[0].id,
            "worker-a",
            "timeout",
            Utc::now() + Duration::minutes(10),
        )
        .await
        .unwrap();

    let early = store
        .claim_pending(&ClaimRequest::new("worker-a", 1, Duration::seconds(30)))
        .await
        .unwrap();
    assert!(early.is_empty());

    let later = store
        .claim_pending(
            &ClaimRequest::new("worker-a", 1, Duration::seconds(30))
                .at(Utc::now() + Duration::minutes(11)),
        )
        .await
        .unwrap();
    assert_eq!(later.len(), 1);
    assert_eq!(later[0].attempts, 2);
}

#[tokio::test]
#[serial]
async fn claim_filters_tenants() {
    let store = get_test_store().await;
    let tenant_a = TenantId::new();
    let tenant_b = TenantId::new();
    start(&store, tenant_a, vec![outbox_row(tenant_a)]).await;
    start(&store, tenant_b, vec![outbox_row(tenant_b)]).await;

    let claimed = store
        .claim_pending(
            &ClaimRequest::new("worker-a", 10, Duration::seconds(30))
                .tenants(TenantFilter::Only(vec![tenant_b])),
        )
        .await
        .unwrap();

    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].tenant_id, tenant_b);
}

#[tokio::test]
#[serial]
async fn concurrent_claims_are_disjoint() {
    let store = get_test_store().await;
    let tenant = TenantId::new();
    for _ in 0..20 {
        start(&store, tenant, vec![outbox_row(tenant)]).await;
    }

    let req_a = ClaimRequest::new("worker-a", 15, Duration::seconds(30));
    let req_b = ClaimRequest::new("worker-b", 15, Duration::seconds(30));
    let (a, b) = tokio::join!(store.claim_pending(&req_a), store.claim_pending(&req_b),);
    let a = a.unwrap();
    let b = b.unwrap();

    assert_eq!(a.len() + b.len(), 20);
    assert!(a.iter().all(|m| !b.iter().any(|other| other.id == m.id)));
}
