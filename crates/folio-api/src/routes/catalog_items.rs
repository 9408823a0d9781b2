//! # Catalog Item API
//!
//! Each new catalog item draws exactly one code from the sequence of its
//! (tenant, catalog configuration, group) scope.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use folio_sequence::{CatalogItemScope, ScopeKind};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, TenantContext, Validate};
use crate::routes::{issued, persist_failed, visible_to};
use crate::state::{AppState, CatalogItemRecord};

/// Request to create a catalog item.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCatalogItemRequest {
    pub catalog_config_id: Option<i64>,
    pub group_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub attributes: serde_json::Value,
}

impl Validate for CreateCatalogItemRequest {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.name.len() > 255 {
            return Err("name must not exceed 255 characters".to_string());
        }
        Ok(())
    }
}

/// Build the catalog items router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/catalog-items", post(create_catalog_item))
        .route("/v1/catalog-items/{id}", get(get_catalog_item))
}

/// POST /v1/catalog-items: Create a catalog item with the next code in its group.
#[utoipa::path(
    post,
    path = "/v1/catalog-items",
    request_body = CreateCatalogItemRequest,
    params(("X-Tenant-Id" = i64, Header, description = "Tenant the item belongs to")),
    responses(
        (status = 201, description = "Catalog item created", body = CatalogItemRecord),
        (status = 422, description = "Invalid or unavailable scope", body = crate::error::ErrorBody),
    ),
    tag = "catalog_items"
)]
pub(crate) async fn create_catalog_item(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    TenantContext(tenant): TenantContext,
    body: Result<Json<CreateCatalogItemRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CatalogItemRecord>), AppError> {
    let req = extract_validated_json(body)?;
    let scope = CatalogItemScope::required(Some(tenant.get()), req.catalog_config_id, req.group_id)?;
    let code = issued(
        ScopeKind::CatalogItem,
        state.sequences.catalog_items.allocate(&scope).await,
    )?;

    let record = CatalogItemRecord {
        id: Uuid::new_v4(),
        tenant_id: tenant.get(),
        catalog_config_id: scope.catalog_config_id().get(),
        group_id: scope.group_id().get(),
        code,
        name: req.name,
        attributes: req.attributes,
        created_at: Utc::now(),
    };

    if let Some(pool) = &state.db_pool {
        crate::db::records::insert_catalog_item(pool, &record)
            .await
            .map_err(|e| persist_failed(ScopeKind::CatalogItem, code, e))?;
    }
    state.catalog_items.insert(record.id, record.clone());
    tracing::info!(id = %record.id, scope = %scope, code, "created catalog item");

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /v1/catalog-items/{id}: Fetch a catalog item of the caller's tenant.
#[utoipa::path(
    get,
    path = "/v1/catalog-items/{id}",
    params(
        ("id" = Uuid, Path, description = "Catalog item ID"),
        ("X-Tenant-Id" = i64, Header, description = "Caller's tenant"),
    ),
    responses(
        (status = 200, description = "Catalog item found", body = CatalogItemRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "catalog_items"
)]
pub(crate) async fn get_catalog_item(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    TenantContext(tenant): TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<CatalogItemRecord>, AppError> {
    visible_to(state.catalog_items.get(&id), tenant, "catalog item", id).map(Json)
}
