//! # Database Persistence Layer
//!
//! PostgreSQL persistence via SQLx.
//!
//! The database layer is **optional**. When `DATABASE_URL` is set, records,
//! parent scopes and sequence counters all live in PostgreSQL. When absent,
//! the API runs in-memory only (development and tests).
//!
//! Counter rows are read and written by `folio_sequence::PgCounterStore`;
//! this module owns the schema (embedded migrations) and the record and
//! parent-scope tables.

pub mod records;
pub mod scopes;

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::state::AppConfig;

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if no database URL is configured (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool(config: &AppConfig) -> Result<Option<PgPool>, sqlx::Error> {
    let url = match &config.database_url {
        Some(url) => url,
        None => {
            tracing::warn!(
                "DATABASE_URL not set, running in-memory only mode. \
                 Records and sequence counters will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(2.min(config.database_max_connections))
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!(
        max_connections = config.database_max_connections,
        "Connected to PostgreSQL"
    );

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}
