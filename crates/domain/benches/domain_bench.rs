use common::{AggregateId, TenantId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    AuditReconstructor, CommandBus, CommandContext, Company, CompanyEvent, DomainEvent,
    RegisterCompany, RenameCompany, Versioned,
};
use event_store::{AppendRequest, EventEnvelope, EventStore, InMemoryEventStore, Version};

fn make_envelope(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    version: i64,
    event: &CompanyEvent,
) -> EventEnvelope {
    EventEnvelope::builder()
        .tenant_id(tenant_id)
        .aggregate_id(aggregate_id)
        .aggregate_type("Company")
        .event_type(event.event_type())
        .version(Version::new(version))
        .payload(event)
        .unwrap()
        .build()
}

/// Writes one registration followed by `renames` rename events.
fn seed_company(
    rt: &tokio::runtime::Runtime,
    store: &InMemoryEventStore,
    tenant_id: TenantId,
    renames: i64,
) -> AggregateId {
    let id = AggregateId::new();
    rt.block_on(async {
        let registered =
            CompanyEvent::company_registered(id, "ACME".to_string(), "Acme".to_string());
        let mut events = vec![make_envelope(tenant_id, id, 1, &registered)];
        for v in 2..=renames + 1 {
            let renamed = CompanyEvent::company_renamed(format!("Acme {v}"));
            events.push(make_envelope(tenant_id, id, v, &renamed));
        }
        store
            .start_stream(AppendRequest::start(tenant_id, id).events(events))
            .await
            .unwrap();
    });
    id
}

fn bench_register_company(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/register_company", |b| {
        b.iter(|| {
            rt.block_on(async {
                let bus = CommandBus::new(InMemoryEventStore::new());
                let ctx = CommandContext::new(TenantId::new());
                bus.dispatch(&ctx, RegisterCompany::new("ACME", "Acme"))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_rename_company(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let bus = CommandBus::new(InMemoryEventStore::new());
    let ctx = CommandContext::new(TenantId::new());
    let company_id = rt.block_on(async {
        bus.dispatch(&ctx, RegisterCompany::new("ACME", "Acme"))
            .await
            .unwrap()
            .aggregate_id
    });

    let mut n = 0u64;
    c.bench_function("domain/rename_company", |b| {
        b.iter(|| {
            n += 1;
            rt.block_on(async {
                bus.dispatch(&ctx, RenameCompany::new(company_id, format!("Acme {n}")))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_replay(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let tenant_id = TenantId::new();

    for renames in [49, 99] {
        let id = seed_company(&rt, &store, tenant_id, renames);
        let name = format!("domain/replay_{}_events", renames + 1);
        c.bench_function(&name, |b| {
            b.iter(|| {
                rt.block_on(async {
                    let events = store.fetch_stream(tenant_id, id).await.unwrap();
                    Versioned::<Company>::from_envelopes(&events).unwrap();
                });
            });
        });
    }
}

fn bench_audit_log(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let tenant_id = TenantId::new();
    let id = seed_company(&rt, &store, tenant_id, 99);
    let audit = AuditReconstructor::new(store);

    c.bench_function("domain/audit_log_100_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                audit
                    .get_audit_log::<Company>(tenant_id, id)
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_register_company,
    bench_rename_company,
    bench_replay,
    bench_audit_log,
);
criterion_main!(benches);
