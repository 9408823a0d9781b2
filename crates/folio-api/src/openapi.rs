//! # OpenAPI Document Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the bearer token security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Bearer token authentication. Set via AUTH_TOKEN env var; \
                             prefix with `operator:` or `admin:` to select a role, or \
                             `operator@{tenant}:` to bind the token to one tenant.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Assembled OpenAPI document for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Folio API",
        version = "0.1.0",
        description = "Multi-tenant business records with scoped sequential codes.\n\n\
            Every catalog item, inventory movement and entity record receives a code that is \
            unique and strictly increasing within its scope: the tenant plus the parent \
            configuration it belongs to. Parent scopes are managed under `/v1/scopes`.\n\n\
            Authentication: `Authorization: Bearer <token>`. Tenant: `X-Tenant-Id` header, optional for tenant-bound tokens. \
            Health probes (`/health/*`) are unauthenticated.",
        license(name = "AGPL-3.0-or-later")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        crate::routes::scopes::register_scope,
        crate::routes::scopes::set_scope_status,
        crate::routes::catalog_items::create_catalog_item,
        crate::routes::catalog_items::get_catalog_item,
        crate::routes::movements::create_movement,
        crate::routes::movements::get_movement,
        crate::routes::entity_records::create_entity_record,
        crate::routes::entity_records::get_entity_record,
    ),
    components(
        schemas(
            crate::state::CatalogItemRecord,
            crate::state::MovementRecord,
            crate::state::EntityRecord,
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            crate::routes::scopes::RegisterScopeRequest,
            crate::routes::scopes::ScopeStatusRequest,
            crate::routes::scopes::ScopeResponse,
            crate::routes::catalog_items::CreateCatalogItemRequest,
            crate::routes::movements::CreateMovementRequest,
            crate::routes::entity_records::CreateEntityRecordRequest,
        ),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "scopes", description = "Parent-scope registry: catalog configuration groups, movement configurations, entity-type-by-group configurations"),
        (name = "catalog_items", description = "Catalog items, coded per catalog configuration group"),
        (name = "movements", description = "Inventory movements, coded per movement configuration"),
        (name = "entity_records", description = "Generic entity records, coded per entity type by group"),
    )
)]
pub struct ApiDoc;

/// Serves the OpenAPI JSON document at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
