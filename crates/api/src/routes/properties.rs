//! Property endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{
    Address, AuditLog, ChangePropertyAddress, DeleteProperty, Lifecycle, Property,
    RegisterProperty, RenameProperty,
};
use serde::{Deserialize, Serialize};

use super::{AppState, AppStore, CreatedResponse, RenameRequest, parse_id};
use crate::context::RequestContext;
use crate::error::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPropertyRequest {
    pub company_id: String,
    pub code: String,
    pub name: String,
    pub address: Address,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyResponse {
    pub id: String,
    pub company_id: Option<String>,
    pub code: String,
    pub name: String,
    pub address: Option<Address>,
    pub lifecycle: Lifecycle,
}

/// POST /properties — register a property under a company.
#[tracing::instrument(skip(state, ctx, req), fields(tenant_id = %ctx.tenant_id))]
pub async fn create<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Json(req): Json<RegisterPropertyRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let company_id = parse_id(&req.company_id)?;
    let cmd = RegisterProperty::new(company_id, req.code, req.name, req.address);
    let result = state.bus.dispatch(&ctx.command_context(), cmd).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse::new(result.aggregate_id)),
    ))
}

/// GET /properties/{id}
pub async fn get<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<PropertyResponse>, ApiError> {
    let property_id = parse_id(&id)?;
    let property: Property = state
        .bus
        .properties()
        .get(&ctx.command_context(), property_id)
        .await?;

    Ok(Json(PropertyResponse {
        id,
        company_id: property.company_id().map(|id| id.to_string()),
        code: property.code().to_string(),
        name: property.name().to_string(),
        address: property.address().cloned(),
        lifecycle: property.lifecycle(),
    }))
}

/// PUT /properties/{id}/name
#[tracing::instrument(skip(state, ctx, req), fields(tenant_id = %ctx.tenant_id))]
pub async fn rename<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<StatusCode, ApiError> {
    let property_id = parse_id(&id)?;
    state
        .bus
        .dispatch(&ctx.command_context(), RenameProperty::new(property_id, req.name))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /properties/{id}/address
#[tracing::instrument(skip(state, ctx, address), fields(tenant_id = %ctx.tenant_id))]
pub async fn change_address<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(address): Json<Address>,
) -> Result<StatusCode, ApiError> {
    let property_id = parse_id(&id)?;
    state
        .bus
        .dispatch(
            &ctx.command_context(),
            ChangePropertyAddress::new(property_id, address),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /properties/{id}
#[tracing::instrument(skip(state, ctx), fields(tenant_id = %ctx.tenant_id))]
pub async fn delete<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let property_id = parse_id(&id)?;
    state
        .bus
        .dispatch(&ctx.command_context(), DeleteProperty::new(property_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /properties/{id}/audit
pub async fn audit<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<AuditLog>, ApiError> {
    let property_id = parse_id(&id)?;
    let log = state
        .audit
        .get_audit_log::<Property>(ctx.tenant_id, property_id)
        .await?;
    Ok(Json(log))
}
