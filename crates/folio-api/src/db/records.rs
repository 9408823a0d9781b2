//! Record persistence.
//!
//! All functions take a `&PgPool` and operate on the `catalog_items`,
//! `inventory_movements` and `entity_records` tables. Each table carries a
//! `UNIQUE (tenant_id, scope…, code)` constraint as a backstop to the
//! allocator.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::state::{CatalogItemRecord, EntityRecord, MovementRecord};

/// Insert a catalog item.
pub async fn insert_catalog_item(
    pool: &PgPool,
    record: &CatalogItemRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO catalog_items (id, tenant_id, catalog_config_id, group_id, code, name, attributes, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(record.id)
    .bind(record.tenant_id)
    .bind(record.catalog_config_id)
    .bind(record.group_id)
    .bind(record.code)
    .bind(&record.name)
    .bind(&record.attributes)
    .bind(record.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert an inventory movement.
pub async fn insert_movement(pool: &PgPool, record: &MovementRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO inventory_movements (id, tenant_id, movement_config_id, code, payload, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(record.id)
    .bind(record.tenant_id)
    .bind(record.movement_config_id)
    .bind(record.code)
    .bind(&record.payload)
    .bind(record.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert an entity record.
pub async fn insert_entity_record(pool: &PgPool, record: &EntityRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO entity_records (id, tenant_id, type_by_group_id, code, fields, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(record.id)
    .bind(record.tenant_id)
    .bind(record.type_by_group_id)
    .bind(record.code)
    .bind(&record.fields)
    .bind(record.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all catalog items (used at startup to hydrate the in-memory store).
pub async fn load_catalog_items(pool: &PgPool) -> Result<Vec<CatalogItemRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CatalogItemRow>(
        "SELECT id, tenant_id, catalog_config_id, group_id, code, name, attributes, created_at
         FROM catalog_items ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(CatalogItemRow::into_record).collect())
}

/// Load all inventory movements.
pub async fn load_movements(pool: &PgPool) -> Result<Vec<MovementRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, MovementRow>(
        "SELECT id, tenant_id, movement_config_id, code, payload, created_at
         FROM inventory_movements ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(MovementRow::into_record).collect())
}

/// Load all entity records.
pub async fn load_entity_records(pool: &PgPool) -> Result<Vec<EntityRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, EntityRecordRow>(
        "SELECT id, tenant_id, type_by_group_id, code, fields, created_at
         FROM entity_records ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(EntityRecordRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct CatalogItemRow {
    id: Uuid,
    tenant_id: i64,
    catalog_config_id: i64,
    group_id: i64,
    code: i64,
    name: String,
    attributes: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl CatalogItemRow {
    fn into_record(self) -> CatalogItemRecord {
        CatalogItemRecord {
            id: self.id,
            tenant_id: self.tenant_id,
            catalog_config_id: self.catalog_config_id,
            group_id: self.group_id,
            code: self.code,
            name: self.name,
            attributes: self.attributes,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MovementRow {
    id: Uuid,
    tenant_id: i64,
    movement_config_id: i64,
    code: i64,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl MovementRow {
    fn into_record(self) -> MovementRecord {
        MovementRecord {
            id: self.id,
            tenant_id: self.tenant_id,
            movement_config_id: self.movement_config_id,
            code: self.code,
            payload: self.payload,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EntityRecordRow {
    id: Uuid,
    tenant_id: i64,
    type_by_group_id: i64,
    code: i64,
    fields: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl EntityRecordRow {
    fn into_record(self) -> EntityRecord {
        EntityRecord {
            id: self.id,
            tenant_id: self.tenant_id,
            type_by_group_id: self.type_by_group_id,
            code: self.code,
            fields: self.fields,
            created_at: self.created_at,
        }
    }
}
