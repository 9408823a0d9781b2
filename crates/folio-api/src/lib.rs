//! # folio-api: Axum API Service
//!
//! HTTP surface for the record-creation features that consume scoped
//! sequence codes, and for the parent-scope registry those codes are
//! validated against.
//!
//! ## API Surface
//!
//! | Prefix                  | Module                         | Domain               |
//! |-------------------------|--------------------------------|----------------------|
//! | `/v1/scopes/*`          | [`routes::scopes`]             | Parent scopes (admin) |
//! | `/v1/catalog-items/*`   | [`routes::catalog_items`]      | Catalog items        |
//! | `/v1/movements/*`       | [`routes::movements`]          | Inventory movements  |
//! | `/v1/entity-records/*`  | [`routes::entity_records`]     | Entity records       |
//! | `/openapi.json`         | [`openapi`]                    | API description      |
//! | `/metrics`              | [`middleware::metrics`]        | Prometheus           |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;

pub use error::AppError;
pub use state::AppState;

use crate::auth::AuthConfig;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes and `/metrics` are mounted outside the auth middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    let api = Router::new()
        .merge(routes::scopes::router())
        .merge(routes::catalog_items::router())
        .merge(routes::movements::router())
        .merge(routes::entity_records::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(middleware::tracing_layer::layer())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    let ops = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(middleware::metrics::render))
        .with_state(state);

    Router::new().merge(ops).merge(api)
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: returns 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}
