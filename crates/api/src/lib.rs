//! HTTP API server for the property management core.
//!
//! Exposes company, property, building and unit commands plus their audit
//! logs and the outbox dead-letter view, with structured logging (tracing)
//! and Prometheus metrics.

pub mod config;
pub mod context;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{AuditReconstructor, CommandBus};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::{AppState, AppStore};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: AppStore>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        // Companies
        .route("/companies", post(routes::companies::create::<S>))
        .route(
            "/companies/{id}",
            get(routes::companies::get::<S>).delete(routes::companies::delete::<S>),
        )
        .route("/companies/{id}/name", put(routes::companies::rename::<S>))
        .route("/companies/{id}/audit", get(routes::companies::audit::<S>))
        // Properties
        .route("/properties", post(routes::properties::create::<S>))
        .route(
            "/properties/{id}",
            get(routes::properties::get::<S>).delete(routes::properties::delete::<S>),
        )
        .route("/properties/{id}/name", put(routes::properties::rename::<S>))
        .route(
            "/properties/{id}/address",
            put(routes::properties::change_address::<S>),
        )
        .route("/properties/{id}/audit", get(routes::properties::audit::<S>))
        // Buildings
        .route("/buildings", post(routes::buildings::create::<S>))
        .route(
            "/buildings/{id}",
            get(routes::buildings::get::<S>).delete(routes::buildings::delete::<S>),
        )
        .route("/buildings/{id}/name", put(routes::buildings::rename::<S>))
        .route(
            "/buildings/{id}/floors",
            put(routes::buildings::change_floors::<S>),
        )
        .route("/buildings/{id}/audit", get(routes::buildings::audit::<S>))
        // Units
        .route("/units", post(routes::units::create::<S>))
        .route(
            "/units/{id}",
            get(routes::units::get::<S>).delete(routes::units::delete::<S>),
        )
        .route("/units/{id}/name", put(routes::units::rename::<S>))
        .route("/units/{id}/details", put(routes::units::change_details::<S>))
        .route("/units/{id}/audit", get(routes::units::audit::<S>))
        // Outbox
        .route("/outbox/messages", get(routes::outbox::list::<S>))
        .route("/outbox/messages/{id}", get(routes::outbox::get::<S>))
        .route(
            "/outbox/messages/{id}/requeue",
            post(routes::outbox::requeue::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over a single store.
pub fn create_state<S: AppStore>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        bus: CommandBus::new(store.clone()),
        audit: AuditReconstructor::new(store.clone()),
        store,
    })
}
