/// Access context endpoints
///
/// - `GET /v1/me` - The caller's resolved identity, tier and home tenant
/// - `GET /v1/admin/scope?tenant_id=` - Tenant an admin operation would be
///   confined to for the requested tenant

use crate::error::ApiResult;
use crate::extractors::{AdminAccess, CurrentAccess};
use atlascrm_shared::auth::authorization::{AccessContext, TenantScope};
use axum::{extract::Query, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub access: AccessContext,

    pub scope: TenantScope,
    pub home: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ScopeQuery {
    pub tenant_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ScopeResponse {
    pub requested: Option<Uuid>,
    pub scope: TenantScope,
}

/// Resolved access context of the caller
///
/// Users without an active membership are onboarded into the default tenant
/// by the lookup itself.
pub async fn me(CurrentAccess(ctx): CurrentAccess) -> ApiResult<Json<MeResponse>> {
    Ok(Json(MeResponse {
        scope: ctx.scope_for(None)?,
        home: ctx.home_path(),
        access: ctx,
    }))
}

/// Effective scope for a requested tenant
///
/// Super-admins get the tenant they asked for; everyone else their own.
pub async fn scope(
    AdminAccess(ctx): AdminAccess,
    Query(query): Query<ScopeQuery>,
) -> ApiResult<Json<ScopeResponse>> {
    Ok(Json(ScopeResponse {
        requested: query.tenant_id,
        scope: ctx.scope_for(query.tenant_id)?,
    }))
}
