//! # Inventory Movement API
//!
//! Movement payloads are opaque JSON shaped by the movement configuration.
//! Each new movement is numbered within its (tenant, movement configuration)
//! scope.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use folio_sequence::{InventoryMovementScope, ScopeKind};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, TenantContext, Validate};
use crate::routes::{issued, persist_failed, visible_to};
use crate::state::{AppState, MovementRecord};

/// Request to record an inventory movement.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMovementRequest {
    pub movement_config_id: Option<i64>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Validate for CreateMovementRequest {
    fn validate(&self) -> Result<(), String> {
        if !(self.payload.is_object() || self.payload.is_null()) {
            return Err("payload must be a JSON object".to_string());
        }
        Ok(())
    }
}

/// Build the movements router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/movements", post(create_movement))
        .route("/v1/movements/{id}", get(get_movement))
}

/// POST /v1/movements: Record a movement with the next code of its configuration.
#[utoipa::path(
    post,
    path = "/v1/movements",
    request_body = CreateMovementRequest,
    params(("X-Tenant-Id" = i64, Header, description = "Tenant the movement belongs to")),
    responses(
        (status = 201, description = "Movement recorded", body = MovementRecord),
        (status = 422, description = "Invalid or unavailable scope", body = crate::error::ErrorBody),
    ),
    tag = "movements"
)]
pub(crate) async fn create_movement(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    TenantContext(tenant): TenantContext,
    body: Result<Json<CreateMovementRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MovementRecord>), AppError> {
    let req = extract_validated_json(body)?;
    let scope = InventoryMovementScope::required(Some(tenant.get()), req.movement_config_id)?;
    let code = issued(
        ScopeKind::InventoryMovement,
        state.sequences.movements.allocate(&scope).await,
    )?;

    let payload = match req.payload {
        serde_json::Value::Null => serde_json::json!({}),
        other => other,
    };
    let record = MovementRecord {
        id: Uuid::new_v4(),
        tenant_id: tenant.get(),
        movement_config_id: scope.movement_config_id().get(),
        code,
        payload,
        created_at: Utc::now(),
    };

    if let Some(pool) = &state.db_pool {
        crate::db::records::insert_movement(pool, &record)
            .await
            .map_err(|e| persist_failed(ScopeKind::InventoryMovement, code, e))?;
    }
    state.movements.insert(record.id, record.clone());
    tracing::info!(id = %record.id, scope = %scope, code, "recorded inventory movement");

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /v1/movements/{id}: Fetch a movement of the caller's tenant.
#[utoipa::path(
    get,
    path = "/v1/movements/{id}",
    params(
        ("id" = Uuid, Path, description = "Movement ID"),
        ("X-Tenant-Id" = i64, Header, description = "Caller's tenant"),
    ),
    responses(
        (status = 200, description = "Movement found", body = MovementRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "movements"
)]
pub(crate) async fn get_movement(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    TenantContext(tenant): TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<MovementRecord>, AppError> {
    visible_to(state.movements.get(&id), tenant, "movement", id).map(Json)
}
