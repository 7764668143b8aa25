//! Unit endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{
    AuditLog, ChangeUnitDetails, DeleteUnit, Lifecycle, RegisterUnit, RenameUnit, Unit,
    UnitDetails,
};
use serde::{Deserialize, Serialize};

use super::{AppState, AppStore, CreatedResponse, RenameRequest, parse_id};
use crate::context::RequestContext;
use crate::error::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUnitRequest {
    pub building_id: String,
    pub code: String,
    pub name: String,
    pub details: UnitDetails,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitResponse {
    pub id: String,
    pub building_id: Option<String>,
    pub code: String,
    pub name: String,
    pub details: UnitDetails,
    pub lifecycle: Lifecycle,
}

/// POST /units — register a unit in a building.
#[tracing::instrument(skip(state, ctx, req), fields(tenant_id = %ctx.tenant_id))]
pub async fn create<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Json(req): Json<RegisterUnitRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let building_id = parse_id(&req.building_id)?;
    let cmd = RegisterUnit::new(building_id, req.code, req.name, req.details);
    let result = state.bus.dispatch(&ctx.command_context(), cmd).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse::new(result.aggregate_id)),
    ))
}

/// GET /units/{id}
pub async fn get<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<UnitResponse>, ApiError> {
    let unit_id = parse_id(&id)?;
    let unit: Unit = state
        .bus
        .units()
        .get(&ctx.command_context(), unit_id)
        .await?;

    Ok(Json(UnitResponse {
        id,
        building_id: unit.building_id().map(|id| id.to_string()),
        code: unit.code().to_string(),
        name: unit.name().to_string(),
        details: unit.details(),
        lifecycle: unit.lifecycle(),
    }))
}

/// PUT /units/{id}/name
#[tracing::instrument(skip(state, ctx, req), fields(tenant_id = %ctx.tenant_id))]
pub async fn rename<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<StatusCode, ApiError> {
    let unit_id = parse_id(&id)?;
    state
        .bus
        .dispatch(&ctx.command_context(), RenameUnit::new(unit_id, req.name))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /units/{id}/details
#[tracing::instrument(skip(state, ctx), fields(tenant_id = %ctx.tenant_id))]
pub async fn change_details<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(details): Json<UnitDetails>,
) -> Result<StatusCode, ApiError> {
    let unit_id = parse_id(&id)?;
    state
        .bus
        .dispatch(&ctx.command_context(), ChangeUnitDetails::new(unit_id, details))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /units/{id}
#[tracing::instrument(skip(state, ctx), fields(tenant_id = %ctx.tenant_id))]
pub async fn delete<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let unit_id = parse_id(&id)?;
    state
        .bus
        .dispatch(&ctx.command_context(), DeleteUnit::new(unit_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /units/{id}/audit
pub async fn audit<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<AuditLog>, ApiError> {
    let unit_id = parse_id(&id)?;
    let log = state
        .audit
        .get_audit_log::<Unit>(ctx.tenant_id, unit_id)
        .await?;
    Ok(Json(log))
}
