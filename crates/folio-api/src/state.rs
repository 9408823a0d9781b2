//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! ## Architecture
//!
//! - **Records**: catalog items, inventory movements and entity records in
//!   in-memory [`Store`]s, written through to PostgreSQL when a pool is
//!   configured and hydrated from it at startup.
//! - **Sequences**: one code allocator per record family. Backed by the
//!   same database as the records, or by a [`MemoryDatabase`] when none is
//!   configured.
//! - **Scope registry**: the parent configuration records the allocators
//!   validate against.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use folio_core::TenantId;
use folio_sequence::{
    CatalogItemCodes, EntityRecordCodes, InventoryMovementCodes, MemoryDatabase, ScopeKind,
};
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// The lock is `parking_lot` and is never held across `.await` points.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: Uuid, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Retrieve a record by ID.
    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Record Types -------------------------------------------------------------

/// A catalog item. `code` is unique per (tenant, catalog config, group).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CatalogItemRecord {
    pub id: Uuid,
    pub tenant_id: i64,
    pub catalog_config_id: i64,
    pub group_id: i64,
    pub code: i64,
    pub name: String,
    pub attributes: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// An inventory movement. `code` is unique per (tenant, movement config).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MovementRecord {
    pub id: Uuid,
    pub tenant_id: i64,
    pub movement_config_id: i64,
    pub code: i64,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A generic entity record. `code` is unique per (tenant, type-by-group).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EntityRecord {
    pub id: Uuid,
    pub tenant_id: i64,
    pub type_by_group_id: i64,
    pub code: i64,
    pub fields: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Records are only visible to their own tenant.
pub trait TenantOwned {
    fn tenant_id(&self) -> i64;
}

impl TenantOwned for CatalogItemRecord {
    fn tenant_id(&self) -> i64 {
        self.tenant_id
    }
}

impl TenantOwned for MovementRecord {
    fn tenant_id(&self) -> i64 {
        self.tenant_id
    }
}

impl TenantOwned for EntityRecord {
    fn tenant_id(&self) -> i64 {
        self.tenant_id
    }
}

// -- Configuration ------------------------------------------------------------

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Bearer secret. `None` disables authentication.
    pub auth_token: Option<String>,
    /// PostgreSQL URL. `None` runs everything in memory.
    pub database_url: Option<String>,
    /// Upper bound on pooled connections.
    pub database_max_connections: u32,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            database_url: None,
            database_max_connections: 20,
            log_format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source. Unparsable
    /// numbers fall back to their defaults; empty strings count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            auth_token: var("AUTH_TOKEN"),
            database_url: var("DATABASE_URL"),
            database_max_connections: var("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.parse::<u32>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.database_max_connections),
            log_format: match var("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        }
    }
}

// -- Sequences & Scope Registry -----------------------------------------------

/// The code allocators, one per record family.
#[derive(Debug, Clone)]
pub struct Sequences {
    pub catalog_items: CatalogItemCodes,
    pub movements: InventoryMovementCodes,
    pub entity_records: EntityRecordCodes,
}

impl Sequences {
    /// Allocators over the in-memory backend.
    pub fn in_memory(db: &MemoryDatabase) -> Self {
        Self {
            catalog_items: CatalogItemCodes::in_memory(db),
            movements: InventoryMovementCodes::in_memory(db),
            entity_records: EntityRecordCodes::in_memory(db),
        }
    }

    /// Allocators over PostgreSQL.
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            catalog_items: CatalogItemCodes::postgres(pool.clone()),
            movements: InventoryMovementCodes::postgres(pool.clone()),
            entity_records: EntityRecordCodes::postgres(pool.clone()),
        }
    }
}

/// Where parent configuration records live.
#[derive(Debug, Clone)]
pub enum ScopeRegistry {
    Memory(MemoryDatabase),
    Postgres(PgPool),
}

impl ScopeRegistry {
    /// Register a parent scope for `tenant`. `Ok(false)` when the
    /// identifiers are already taken. Malformed ids are a validation error.
    pub async fn register(
        &self,
        kind: ScopeKind,
        parent_ids: &[i64],
        tenant: TenantId,
        active: bool,
    ) -> Result<bool, AppError> {
        let ids = kind.parent_scope_ids(parent_ids)?;
        match self {
            Self::Memory(db) => Ok(db.register_parent(kind, &ids, tenant, active)),
            Self::Postgres(pool) => {
                Ok(crate::db::scopes::insert(pool, kind, &ids, tenant, active).await?)
            }
        }
    }

    /// Flip a parent scope's `active` flag. `Ok(false)` when `tenant` owns
    /// no such scope.
    pub async fn set_active(
        &self,
        kind: ScopeKind,
        parent_ids: &[i64],
        tenant: TenantId,
        active: bool,
    ) -> Result<bool, AppError> {
        let ids = kind.parent_scope_ids(parent_ids)?;
        match self {
            Self::Memory(db) => Ok(db.set_parent_active(kind, &ids, tenant, active)),
            Self::Postgres(pool) => {
                Ok(crate::db::scopes::set_active(pool, kind, &ids, tenant, active).await?)
            }
        }
    }
}

// -- AppState -----------------------------------------------------------------

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub catalog_items: Store<CatalogItemRecord>,
    pub movements: Store<MovementRecord>,
    pub entity_records: Store<EntityRecord>,
    pub sequences: Sequences,
    pub scopes: ScopeRegistry,
    /// `None` in in-memory mode.
    pub db_pool: Option<PgPool>,
    /// Prometheus exposition handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("catalog_items", &self.catalog_items.len())
            .field("movements", &self.movements.len())
            .field("entity_records", &self.entity_records.len())
            .field("database", &self.db_pool.is_some())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// In-memory state with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None)
    }

    /// State for `config`. With a pool, sequences, scopes and records all
    /// live in PostgreSQL; without one, in process memory.
    pub fn with_config(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        let (sequences, scopes) = match &db_pool {
            Some(pool) => (Sequences::postgres(pool), ScopeRegistry::Postgres(pool.clone())),
            None => {
                let db = MemoryDatabase::new();
                (Sequences::in_memory(&db), ScopeRegistry::Memory(db))
            }
        };

        Self {
            config,
            catalog_items: Store::new(),
            movements: Store::new(),
            entity_records: Store::new(),
            sequences,
            scopes,
            db_pool,
            metrics: None,
        }
    }

    /// Attach a Prometheus handle so `/metrics` can render.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Load persisted records into the in-memory stores. No-op without a
    /// database.
    pub async fn hydrate_from_db(&self) -> Result<(), sqlx::Error> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let items = crate::db::records::load_catalog_items(pool).await?;
        let item_count = items.len();
        for record in items {
            self.catalog_items.insert(record.id, record);
        }

        let movements = crate::db::records::load_movements(pool).await?;
        let movement_count = movements.len();
        for record in movements {
            self.movements.insert(record.id, record);
        }

        let entity_records = crate::db::records::load_entity_records(pool).await?;
        let entity_record_count = entity_records.len();
        for record in entity_records {
            self.entity_records.insert(record.id, record);
        }

        tracing::info!(
            catalog_items = item_count,
            movements = movement_count,
            entity_records = entity_record_count,
            "Hydrated in-memory stores from database"
        );

        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn config_defaults() {
        let config = AppConfig::from_lookup(env(&[]));
        assert_eq!(config.port, 8080);
        assert!(config.auth_token.is_none());
        assert!(config.database_url.is_none());
        assert_eq!(config.database_max_connections, 20);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn config_reads_variables() {
        let config = AppConfig::from_lookup(env(&[
            ("PORT", "9090"),
            ("AUTH_TOKEN", "s3cret"),
            ("DATABASE_URL", "postgres://localhost/folio"),
            ("DATABASE_MAX_CONNECTIONS", "5"),
            ("LOG_FORMAT", "JSON"),
        ]));
        assert_eq!(config.port, 9090);
        assert_eq!(config.auth_token.as_deref(), Some("s3cret"));
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/folio"));
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn config_ignores_garbage() {
        let config = AppConfig::from_lookup(env(&[
            ("PORT", "eighty"),
            ("AUTH_TOKEN", "  "),
            ("DATABASE_MAX_CONNECTIONS", "0"),
        ]));
        assert_eq!(config.port, 8080);
        assert!(config.auth_token.is_none());
        assert_eq!(config.database_max_connections, 20);
    }

    #[test]
    fn store_insert_and_get() {
        let store: Store<i64> = Store::new();
        let id = Uuid::new_v4();
        assert!(store.insert(id, 7).is_none());
        assert_eq!(store.get(&id), Some(7));
        assert_eq!(store.len(), 1);
        assert!(store.get(&Uuid::new_v4()).is_none());
    }

    #[tokio::test]
    async fn in_memory_registry_round_trip() {
        let state = AppState::new();
        let tenant = TenantId::new(7).unwrap();

        assert!(state
            .scopes
            .register(ScopeKind::InventoryMovement, &[4], tenant, true)
            .await
            .unwrap());
        assert!(!state
            .scopes
            .register(ScopeKind::InventoryMovement, &[4], tenant, true)
            .await
            .unwrap());
        assert_eq!(
            state.sequences.movements.allocate_next_code(7, 4).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn registry_rejects_malformed_parent_ids_as_validation() {
        let state = AppState::new();
        let tenant = TenantId::new(7).unwrap();

        let err = state
            .scopes
            .register(ScopeKind::CatalogItem, &[3], tenant, true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = state
            .scopes
            .set_active(ScopeKind::EntityRecord, &[0], tenant, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn hydrate_without_database_is_noop() {
        let state = AppState::new();
        state.hydrate_from_db().await.unwrap();
        assert!(state.catalog_items.is_empty());
    }
}
