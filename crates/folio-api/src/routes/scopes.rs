//! # Parent-Scope Registry API
//!
//! Registers and (de)activates the parent configuration records that
//! sequence allocation validates against: catalog configuration groups,
//! movement configurations and entity-type-by-group configurations.
//!
//! A scope is always registered for the caller's tenant. Deactivating a
//! scope stops code issuance immediately; its counter row is kept, so
//! reactivation resumes where numbering left off.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::{Json, Router};
use folio_sequence::ScopeKind;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, TenantContext, Validate};
use crate::state::AppState;

fn default_active() -> bool {
    true
}

/// Request to register a parent scope.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterScopeRequest {
    /// Parent identifiers in key order, e.g. `[catalog_config_id, group_id]`.
    pub parent_ids: Vec<i64>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl Validate for RegisterScopeRequest {
    fn validate(&self) -> Result<(), String> {
        if self.parent_ids.is_empty() {
            return Err("parent_ids must not be empty".to_string());
        }
        Ok(())
    }
}

/// Request to activate or deactivate a parent scope.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ScopeStatusRequest {
    pub parent_ids: Vec<i64>,
    pub active: bool,
}

impl Validate for ScopeStatusRequest {
    fn validate(&self) -> Result<(), String> {
        if self.parent_ids.is_empty() {
            return Err("parent_ids must not be empty".to_string());
        }
        Ok(())
    }
}

/// A parent scope as stored.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScopeResponse {
    pub kind: String,
    pub tenant_id: i64,
    pub parent_ids: Vec<i64>,
    pub active: bool,
}

/// Build the scopes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/scopes/{kind}", post(register_scope))
        .route("/v1/scopes/{kind}/status", put(set_scope_status))
}

fn parse_kind(raw: &str) -> Result<ScopeKind, AppError> {
    raw.parse().map_err(AppError::NotFound)
}

/// POST /v1/scopes/{kind}: Register a parent scope for the caller's tenant.
#[utoipa::path(
    post,
    path = "/v1/scopes/{kind}",
    params(("kind" = String, Path, description = "catalog-item, inventory-movement or entity-record")),
    request_body = RegisterScopeRequest,
    responses(
        (status = 201, description = "Scope registered", body = ScopeResponse),
        (status = 409, description = "Identifiers already registered", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid identifiers", body = crate::error::ErrorBody),
    ),
    tag = "scopes"
)]
pub(crate) async fn register_scope(
    State(state): State<AppState>,
    caller: CallerIdentity,
    TenantContext(tenant): TenantContext,
    Path(kind): Path<String>,
    body: Result<Json<RegisterScopeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ScopeResponse>), AppError> {
    require_role(&caller, Role::Admin)?;
    let kind = parse_kind(&kind)?;
    let req = extract_validated_json(body)?;

    if !state.scopes.register(kind, &req.parent_ids, tenant, req.active).await? {
        return Err(AppError::Conflict(format!(
            "{kind} scope {:?} is already registered",
            req.parent_ids
        )));
    }
    tracing::info!(kind = %kind, %tenant, parent_ids = ?req.parent_ids, active = req.active, "registered parent scope");

    Ok((
        StatusCode::CREATED,
        Json(ScopeResponse {
            kind: kind.to_string(),
            tenant_id: tenant.get(),
            parent_ids: req.parent_ids,
            active: req.active,
        }),
    ))
}

/// PUT /v1/scopes/{kind}/status: Activate or deactivate a parent scope.
#[utoipa::path(
    put,
    path = "/v1/scopes/{kind}/status",
    params(("kind" = String, Path, description = "catalog-item, inventory-movement or entity-record")),
    request_body = ScopeStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ScopeResponse),
        (status = 404, description = "No such scope for this tenant", body = crate::error::ErrorBody),
    ),
    tag = "scopes"
)]
pub(crate) async fn set_scope_status(
    State(state): State<AppState>,
    caller: CallerIdentity,
    TenantContext(tenant): TenantContext,
    Path(kind): Path<String>,
    body: Result<Json<ScopeStatusRequest>, JsonRejection>,
) -> Result<Json<ScopeResponse>, AppError> {
    require_role(&caller, Role::Admin)?;
    let kind = parse_kind(&kind)?;
    let req = extract_validated_json(body)?;

    if !state.scopes.set_active(kind, &req.parent_ids, tenant, req.active).await? {
        return Err(AppError::NotFound(format!(
            "{kind} scope {:?} not found",
            req.parent_ids
        )));
    }
    tracing::info!(kind = %kind, %tenant, parent_ids = ?req.parent_ids, active = req.active, "changed parent scope status");

    Ok(Json(ScopeResponse {
        kind: kind.to_string(),
        tenant_id: tenant.get(),
        parent_ids: req.parent_ids,
        active: req.active,
    }))
}
