//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use common::TenantId;
use event_store::{ClaimRequest, InMemoryEventStore, OutboxStatus, OutboxStore};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    setup_with_store().0
}

fn setup_with_store() -> (axum::Router, InMemoryEventStore) {
    let store = InMemoryEventStore::new();
    let state = api::create_state(store.clone());
    (api::create_app(state, get_metrics_handle()), store)
}

/// Sends a request as `tenant` and returns the status and JSON body (Null when empty).
async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    tenant: Option<TenantId>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-actor", "jane@acme.test");
    if let Some(tenant) = tenant {
        builder = builder.header("x-tenant-id", tenant.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn register_company(app: &axum::Router, tenant: TenantId, code: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/companies",
        Some(tenant),
        Some(json!({"code": code, "name": "Acme"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let (status, body) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_company_lifecycle() {
    let app = setup();
    let tenant = TenantId::new();
    let id = register_company(&app, tenant, "acme").await;

    let (status, body) = send(&app, "GET", &format!("/companies/{id}"), Some(tenant), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], "ACME");
    assert_eq!(body["lifecycle"], "Active");

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/companies/{id}/name"),
        Some(tenant),
        Some(json!({"name": "Acme Corp"})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "DELETE", &format!("/companies/{id}"), Some(tenant), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "GET", &format!("/companies/{id}"), Some(tenant), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Acme Corp");
    assert_eq!(body["lifecycle"], "Deleted");
}

#[tokio::test]
async fn test_audit_log_shape() {
    let app = setup();
    let tenant = TenantId::new();
    let id = register_company(&app, tenant, "acme").await;
    send(
        &app,
        "PUT",
        &format!("/companies/{id}/name"),
        Some(tenant),
        Some(json!({"name": "Acme Corp"})),
    )
    .await;

    let (status, body) = send(
        &app,
        "GET",
        &format!("/companies/{id}/audit"),
        Some(tenant),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["aggregateId"], id);
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["eventType"], "CompanyRegistered");
    assert_eq!(entries[0]["version"], 1);
    assert_eq!(entries[1]["eventType"], "CompanyRenamed");
    assert_eq!(entries[1]["actor"], "jane@acme.test");
    assert_eq!(
        entries[1]["data"],
        json!({"oldName": "Acme", "newName": "Acme Corp"})
    );
}

#[tokio::test]
async fn test_missing_tenant_is_unauthorized() {
    let app = setup();

    let (status, body) = send(
        &app,
        "POST",
        "/companies",
        None,
        Some(json!({"code": "acme", "name": "Acme"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("x-tenant-id"));
}

#[tokio::test]
async fn test_error_mapping() {
    let app = setup();
    let tenant = TenantId::new();
    let id = register_company(&app, tenant, "acme").await;

    // Same name again is a business rule violation.
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/companies/{id}/name"),
        Some(tenant),
        Some(json!({"name": "Acme"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "NAME_UNCHANGED");

    // Duplicate code within the tenant.
    let (status, _) = send(
        &app,
        "POST",
        "/companies",
        Some(tenant),
        Some(json!({"code": "ACME", "name": "Other"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Other tenants cannot see the company.
    let (status, _) = send(
        &app,
        "GET",
        &format!("/companies/{id}"),
        Some(TenantId::new()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/companies/not-an-id", Some(tenant), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_property_hierarchy() {
    let app = setup();
    let tenant = TenantId::new();
    let company_id = register_company(&app, tenant, "acme").await;

    let (status, body) = send(
        &app,
        "POST",
        "/properties",
        Some(tenant),
        Some(json!({
            "companyId": company_id,
            "code": "hq",
            "name": "Headquarters",
            "address": {
                "street": "Main St 1",
                "city": "Springfield",
                "postalCode": "12345",
                "country": "US"
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let property_id = body["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        "/buildings",
        Some(tenant),
        Some(json!({"propertyId": property_id, "code": "a", "name": "Tower A", "floors": 12})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let building_id = body["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/buildings/{building_id}/floors"),
        Some(tenant),
        Some(json!({"floors": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(
        &app,
        "POST",
        "/units",
        Some(tenant),
        Some(json!({
            "buildingId": building_id,
            "code": "101",
            "name": "Flat 101",
            "details": {"floor": 1, "areaSqm": 72.5, "rooms": 3}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let unit_id = body["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/units/{unit_id}/details"),
        Some(tenant),
        Some(json!({"floor": 1, "areaSqm": 80.0, "rooms": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "GET", &format!("/units/{unit_id}"), Some(tenant), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["buildingId"], building_id);
    assert_eq!(body["details"]["areaSqm"], 80.0);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/units/{unit_id}/audit"),
        Some(tenant),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"].as_array().unwrap().len(), 2);

    // A unit id is not a building.
    let (status, _) = send(
        &app,
        "GET",
        &format!("/buildings/{unit_id}/audit"),
        Some(tenant),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_outbox_dead_letter_requeue() {
    let (app, store) = setup_with_store();
    let tenant = TenantId::new();
    register_company(&app, tenant, "acme").await;

    let (status, body) = send(
        &app,
        "GET",
        "/outbox/messages?status=pending",
        Some(tenant),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let pending = body.as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["eventType"], "companies.registered.v1");
    assert_eq!(pending[0]["payload"]["code"], "ACME");

    // Drive the message into the dead-letter state.
    let claimed = store
        .claim_pending(&ClaimRequest::new("test-worker", 10, chrono::Duration::seconds(30)))
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);
    let message_id = claimed[0].id;
    store
        .mark_failed(tenant, message_id, "test-worker", "broker down")
        .await
        .unwrap();

    let (status, body) = send(&app, "GET", "/outbox/messages", Some(tenant), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["status"], "Failed");
    assert_eq!(body[0]["lastError"], "broker down");

    let uri = format!("/outbox/messages/{message_id}/requeue");
    let (status, _) = send(&app, "POST", &uri, Some(tenant), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let message = store.get_message(tenant, message_id).await.unwrap().unwrap();
    assert_eq!(message.status, OutboxStatus::Pending);
    assert!(message.next_attempt_at <= Utc::now());

    // Only failed messages can be requeued.
    let (status, _) = send(&app, "POST", &uri, Some(tenant), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Other tenants cannot see the message.
    let (status, _) = send(
        &app,
        "GET",
        &format!("/outbox/messages/{message_id}"),
        Some(TenantId::new()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_outbox_status_is_bad_request() {
    let app = setup();

    let (status, _) = send(
        &app,
        "GET",
        "/outbox/messages?status=lost",
        Some(TenantId::new()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    register_company(&app, TenantId::new(), "metrics-co").await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("commands_total"));
}
