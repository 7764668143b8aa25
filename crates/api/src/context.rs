//! Caller identity extracted from request headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::TenantId;
use domain::CommandContext;

use crate::error::ApiError;

/// Header carrying the tenant the request acts on.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Header carrying the acting user, recorded in the audit log.
pub const ACTOR_HEADER: &str = "x-actor";

/// Header carrying a caller-supplied correlation id, stored with each event.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Tenant and actor of the current request.
///
/// A missing tenant header is rejected with 401, a malformed one with 400.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub tenant_id: TenantId,
    pub actor: Option<String>,
    pub correlation_id: Option<String>,
}

impl RequestContext {
    /// Builds the command context for domain calls.
    pub fn command_context(&self) -> CommandContext {
        let mut ctx = CommandContext::new(self.tenant_id);
        if let Some(actor) = &self.actor {
            ctx = ctx.with_actor(actor.clone());
        }
        if let Some(correlation_id) = &self.correlation_id {
            ctx = ctx.with_correlation_id(correlation_id.clone());
        }
        ctx
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(TENANT_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {TENANT_HEADER} header")))?;

        let tenant_id = raw
            .to_str()
            .ok()
            .and_then(|value| value.trim().parse::<TenantId>().ok())
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid {TENANT_HEADER} header")))?;

        Ok(Self {
            tenant_id,
            actor: optional_header(parts, ACTOR_HEADER),
            correlation_id: optional_header(parts, CORRELATION_HEADER),
        })
    }
}

fn optional_header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
