use chrono::{Duration, Utc};
use criterion::{Criterion, criterion_group, criterion_main};
use event_store::{
    AggregateId, AppendRequest, ClaimRequest, EventEnvelope, InMemoryEventStore, OutboxMessage,
    OutboxStore, TenantId, Version, store::EventStore,
};

fn make_event(tenant_id: TenantId, aggregate_id: AggregateId, version: i64) -> EventEnvelope {
    EventEnvelope::builder()
        .tenant_id(tenant_id)
        .aggregate_id(aggregate_id)
        .aggregate_type("Company")
        .event_type("CompanyRenamed")
        .version(Version::new(version))
        .payload_raw(serde_json::json!({
            "type": "CompanyRenamed",
            "data": { "name": format!("Acme {version}") }
        }))
        .build()
}

fn bench_start_stream(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/start_stream", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let tenant = TenantId::new();
                let agg_id = AggregateId::new();
                store
                    .start_stream(
                        AppendRequest::start(tenant, agg_id)
                            .events(vec![make_event(tenant, agg_id, 1)]),
                    )
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_append_batch_10(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/start_stream_batch_10", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let tenant = TenantId::new();
                let agg_id = AggregateId::new();
                let events: Vec<EventEnvelope> =
                    (1..=10).map(|v| make_event(tenant, agg_id, v)).collect();
                store
                    .start_stream(AppendRequest::start(tenant, agg_id).events(events))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_append_with_outbox(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/start_stream_with_outbox", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let tenant = TenantId::new();
                let agg_id = AggregateId::new();
                let row = OutboxMessage::new(
                    tenant,
                    "companies",
                    "companies.registered.v1",
                    b"{}".to_vec(),
                    Utc::now(),
                );
                store
                    .start_stream(
                        AppendRequest::start(tenant, agg_id)
                            .events(vec![make_event(tenant, agg_id, 1)])
                            .outbox(vec![row]),
                    )
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_fetch_stream(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let tenant = TenantId::new();
    let agg_id = AggregateId::new();

    // Pre-populate with 100 events
    rt.block_on(async {
        let events: Vec<EventEnvelope> = (1..=100).map(|v| make_event(tenant, agg_id, v)).collect();
        store
            .start_stream(AppendRequest::start(tenant, agg_id).events(events))
            .await
            .unwrap();
    });

    c.bench_function("event_store/fetch_stream_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.fetch_stream(tenant, agg_id).await.unwrap();
            });
        });
    });
}

fn bench_claim_batch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/claim_100_of_1000", |b| {
        b.iter_batched(
            || {
                rt.block_on(async {
                    let store = InMemoryEventStore::new();
                    let tenant = TenantId::new();
                    for _ in 0..1000 {
                        let agg_id = AggregateId::new();
                        let row = OutboxMessage::new(
                            tenant,
                            "companies",
                            "companies.registered.v1",
                            b"{}".to_vec(),
                            Utc::now(),
                        );
                        store
                            .start_stream(
                                AppendRequest::start(tenant, agg_id)
                                    .events(vec![make_event(tenant, agg_id, 1)])
                                    .outbox(vec![row]),
                            )
                            .await
                            .unwrap();
                    }
                    store
                })
            },
            |store| {
                rt.block_on(async {
                    let claimed = store
                        .claim_pending(&ClaimRequest::new("bench", 100, Duration::seconds(30)))
                        .await
                        .unwrap();
                    assert_eq!(claimed.len(), 100);
                });
            },
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    bench_start_stream,
    bench_append_batch_10,
    bench_append_with_outbox,
    bench_fetch_stream,
    bench_claim_batch,
);
criterion_main!(benches);
