//! Building endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{
    AuditLog, Building, ChangeBuildingFloors, DeleteBuilding, Lifecycle, RegisterBuilding,
    RenameBuilding,
};
use serde::{Deserialize, Serialize};

use super::{AppState, AppStore, CreatedResponse, RenameRequest, parse_id};
use crate::context::RequestContext;
use crate::error::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBuildingRequest {
    pub property_id: String,
    pub code: String,
    pub name: String,
    pub floors: u16,
}

#[derive(Deserialize)]
pub struct ChangeFloorsRequest {
    pub floors: u16,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingResponse {
    pub id: String,
    pub property_id: Option<String>,
    pub code: String,
    pub name: String,
    pub floors: u16,
    pub lifecycle: Lifecycle,
}

/// POST /buildings — register a building on a property.
#[tracing::instrument(skip(state, ctx, req), fields(tenant_id = %ctx.tenant_id))]
pub async fn create<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Json(req): Json<RegisterBuildingRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let property_id = parse_id(&req.property_id)?;
    let cmd = RegisterBuilding::new(property_id, req.code, req.name, req.floors);
    let result = state.bus.dispatch(&ctx.command_context(), cmd).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse::new(result.aggregate_id)),
    ))
}

/// GET /buildings/{id}
pub async fn get<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<BuildingResponse>, ApiError> {
    let building_id = parse_id(&id)?;
    let building: Building = state
        .bus
        .buildings()
        .get(&ctx.command_context(), building_id)
        .await?;

    Ok(Json(BuildingResponse {
        id,
        property_id: building.property_id().map(|id| id.to_string()),
        code: building.code().to_string(),
        name: building.name().to_string(),
        floors: building.floors(),
        lifecycle: building.lifecycle(),
    }))
}

/// PUT /buildings/{id}/name
#[tracing::instrument(skip(state, ctx, req), fields(tenant_id = %ctx.tenant_id))]
pub async fn rename<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<StatusCode, ApiError> {
    let building_id = parse_id(&id)?;
    state
        .bus
        .dispatch(&ctx.command_context(), RenameBuilding::new(building_id, req.name))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /buildings/{id}/floors
#[tracing::instrument(skip(state, ctx, req), fields(tenant_id = %ctx.tenant_id))]
pub async fn change_floors<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(req): Json<ChangeFloorsRequest>,
) -> Result<StatusCode, ApiError> {
    let building_id = parse_id(&id)?;
    state
        .bus
        .dispatch(
            &ctx.command_context(),
            ChangeBuildingFloors::new(building_id, req.floors),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /buildings/{id}
#[tracing::instrument(skip(state, ctx), fields(tenant_id = %ctx.tenant_id))]
pub async fn delete<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let building_id = parse_id(&id)?;
    state
        .bus
        .dispatch(&ctx.command_context(), DeleteBuilding::new(building_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /buildings/{id}/audit
pub async fn audit<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<AuditLog>, ApiError> {
    let building_id = parse_id(&id)?;
    let log = state
        .audit
        .get_audit_log::<Building>(ctx.tenant_id, building_id)
        .await?;
    Ok(Json(log))
}
