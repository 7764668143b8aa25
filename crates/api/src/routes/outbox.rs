//! Outbox inspection and dead-letter requeue endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use event_store::{OutboxMessage, OutboxMessageId, OutboxStatus, OutboxStore};
use serde::{Deserialize, Serialize};

use super::{AppState, AppStore};
use crate::context::RequestContext;
use crate::error::ApiError;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxMessageResponse {
    pub id: String,
    pub topic: String,
    pub event_type: String,
    pub status: OutboxStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub next_attempt_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl From<OutboxMessage> for OutboxMessageResponse {
    fn from(msg: OutboxMessage) -> Self {
        Self {
            id: msg.id.to_string(),
            payload: serde_json::from_slice(&msg.payload).unwrap_or(serde_json::Value::Null),
            topic: msg.topic,
            event_type: msg.event_type,
            status: msg.status,
            attempts: msg.attempts,
            last_error: msg.last_error,
            occurred_at: msg.occurred_at,
            published_at: msg.published_at,
            next_attempt_at: msg.next_attempt_at,
        }
    }
}

fn parse_message_id(raw: &str) -> Result<OutboxMessageId, ApiError> {
    uuid::Uuid::parse_str(raw)
        .map(OutboxMessageId::from_uuid)
        .map_err(|e| ApiError::BadRequest(format!("Invalid message id '{raw}': {e}")))
}

/// GET /outbox/messages?status=failed&limit=50 — messages of the caller's tenant.
///
/// Status defaults to `failed`, the dead-letter view.
pub async fn list<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OutboxMessageResponse>>, ApiError> {
    let status = match query.status.as_deref() {
        None => OutboxStatus::Failed,
        Some(raw) => OutboxStatus::parse(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown outbox status '{raw}'")))?,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let messages = state
        .store
        .list_messages(ctx.tenant_id, status, limit)
        .await?;

    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

/// GET /outbox/messages/{id}
pub async fn get<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<OutboxMessageResponse>, ApiError> {
    let message_id = parse_message_id(&id)?;
    let message = state
        .store
        .get_message(ctx.tenant_id, message_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Outbox message {id} not found")))?;

    Ok(Json(message.into()))
}

/// POST /outbox/messages/{id}/requeue — move a failed message back to pending.
#[tracing::instrument(skip(state, ctx), fields(tenant_id = %ctx.tenant_id))]
pub async fn requeue<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let message_id = parse_message_id(&id)?;
    state.store.requeue_failed(ctx.tenant_id, message_id).await?;

    metrics::counter!("outbox_messages_requeued_total").increment(1);
    tracing::info!(%message_id, "Outbox message requeued");
    Ok(StatusCode::NO_CONTENT)
}
