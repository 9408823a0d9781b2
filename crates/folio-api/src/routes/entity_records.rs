//! # Entity Record API
//!
//! Generic records of a configurable entity type. Numbered within their
//! (tenant, entity type by group) scope.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use folio_sequence::{EntityRecordScope, ScopeKind};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, TenantContext, Validate};
use crate::routes::{issued, persist_failed, visible_to};
use crate::state::{AppState, EntityRecord};

const MAX_FIELDS: usize = 200;

/// Request to create an entity record.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEntityRecordRequest {
    pub type_by_group_id: Option<i64>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Validate for CreateEntityRecordRequest {
    fn validate(&self) -> Result<(), String> {
        if self.fields.len() > MAX_FIELDS {
            return Err(format!("fields must not exceed {MAX_FIELDS} entries"));
        }
        Ok(())
    }
}

/// Build the entity records router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/entity-records", post(create_entity_record))
        .route("/v1/entity-records/{id}", get(get_entity_record))
}

/// POST /v1/entity-records: Create a record with the next code of its type.
#[utoipa::path(
    post,
    path = "/v1/entity-records",
    request_body = CreateEntityRecordRequest,
    params(("X-Tenant-Id" = i64, Header, description = "Tenant the record belongs to")),
    responses(
        (status = 201, description = "Entity record created", body = EntityRecord),
        (status = 422, description = "Invalid or unavailable scope", body = crate::error::ErrorBody),
    ),
    tag = "entity_records"
)]
pub(crate) async fn create_entity_record(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    TenantContext(tenant): TenantContext,
    body: Result<Json<CreateEntityRecordRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EntityRecord>), AppError> {
    let req = extract_validated_json(body)?;
    let scope = EntityRecordScope::required(Some(tenant.get()), req.type_by_group_id)?;
    let code = issued(
        ScopeKind::EntityRecord,
        state.sequences.entity_records.allocate(&scope).await,
    )?;

    let record = EntityRecord {
        id: Uuid::new_v4(),
        tenant_id: tenant.get(),
        type_by_group_id: scope.type_by_group_id().get(),
        code,
        fields: serde_json::Value::Object(req.fields),
        created_at: Utc::now(),
    };

    if let Some(pool) = &state.db_pool {
        crate::db::records::insert_entity_record(pool, &record)
            .await
            .map_err(|e| persist_failed(ScopeKind::EntityRecord, code, e))?;
    }
    state.entity_records.insert(record.id, record.clone());
    tracing::info!(id = %record.id, scope = %scope, code, "created entity record");

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /v1/entity-records/{id}: Fetch a record of the caller's tenant.
#[utoipa::path(
    get,
    path = "/v1/entity-records/{id}",
    params(
        ("id" = Uuid, Path, description = "Entity record ID"),
        ("X-Tenant-Id" = i64, Header, description = "Caller's tenant"),
    ),
    responses(
        (status = 200, description = "Entity record found", body = EntityRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "entity_records"
)]
pub(crate) async fn get_entity_record(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    TenantContext(tenant): TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<EntityRecord>, AppError> {
    visible_to(state.entity_records.get(&id), tenant, "entity record", id).map(Json)
}
