//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use event_store::EventStoreError;
use serde::Serialize;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Missing or invalid caller identity.
    Unauthorized(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Outbox inspection or requeue error.
    Store(EventStoreError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl ApiError {
    /// Returns the HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Domain(err) => domain_status(err),
            ApiError::Store(err) => store_status(err),
        }
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Conflict(_) | DomainError::ConcurrencyConflict { .. } => StatusCode::CONFLICT,
        DomainError::BusinessViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        DomainError::TransientInfrastructure(_) | DomainError::Cancelled => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        DomainError::Serialization(_) | DomainError::EventStore(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn store_status(err: &EventStoreError) -> StatusCode {
    match err {
        EventStoreError::OutboxMessageNotFound(_) => StatusCode::NOT_FOUND,
        EventStoreError::InvalidOutboxTransition { .. } => StatusCode::CONFLICT,
        err if err.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, code) = match self {
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) | ApiError::Unauthorized(msg) => {
                (msg, None)
            }
            ApiError::Domain(DomainError::BusinessViolation(violation)) => {
                (violation.message, Some(violation.code))
            }
            ApiError::Domain(err) => (err.to_string(), None),
            ApiError::Store(err) => (err.to_string(), None),
        };

        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        }

        let body = ErrorBody {
            error: message,
            code,
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<EventStoreError> for ApiError {
    fn from(err: EventStoreError) -> Self {
        ApiError::Store(err)
    }
}
