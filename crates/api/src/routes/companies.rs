//! Company endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{AuditLog, Company, DeleteCompany, Lifecycle, RegisterCompany, RenameCompany};
use serde::{Deserialize, Serialize};

use super::{AppState, AppStore, CreatedResponse, RenameRequest, parse_id};
use crate::context::RequestContext;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct RegisterCompanyRequest {
    pub code: String,
    pub name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyResponse {
    pub id: String,
    pub code: String,
    pub name: String,
    pub lifecycle: Lifecycle,
}

impl CompanyResponse {
    fn from_company(company: &Company, id: String) -> Self {
        Self {
            id,
            code: company.code().to_string(),
            name: company.name().to_string(),
            lifecycle: company.lifecycle(),
        }
    }
}

/// POST /companies — register a company.
#[tracing::instrument(skip(state, ctx, req), fields(tenant_id = %ctx.tenant_id))]
pub async fn create<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Json(req): Json<RegisterCompanyRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let result = state
        .bus
        .dispatch(&ctx.command_context(), RegisterCompany::new(req.code, req.name))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse::new(result.aggregate_id)),
    ))
}

/// GET /companies/{id} — current state, including deleted companies.
pub async fn get<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<CompanyResponse>, ApiError> {
    let company_id = parse_id(&id)?;
    let company = state
        .bus
        .companies()
        .get(&ctx.command_context(), company_id)
        .await?;

    Ok(Json(CompanyResponse::from_company(&company, id)))
}

/// PUT /companies/{id}/name — rename a company.
#[tracing::instrument(skip(state, ctx, req), fields(tenant_id = %ctx.tenant_id))]
pub async fn rename<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<StatusCode, ApiError> {
    let company_id = parse_id(&id)?;
    state
        .bus
        .dispatch(&ctx.command_context(), RenameCompany::new(company_id, req.name))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /companies/{id} — delete a company and release its code.
#[tracing::instrument(skip(state, ctx), fields(tenant_id = %ctx.tenant_id))]
pub async fn delete<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let company_id = parse_id(&id)?;
    state
        .bus
        .dispatch(&ctx.command_context(), DeleteCompany::new(company_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /companies/{id}/audit — who changed what, oldest first.
pub async fn audit<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<AuditLog>, ApiError> {
    let company_id = parse_id(&id)?;
    let log = state
        .audit
        .get_audit_log::<Company>(ctx.tenant_id, company_id)
        .await?;
    Ok(Json(log))
}
