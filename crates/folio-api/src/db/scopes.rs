//! Parent-scope persistence.
//!
//! One table per scope kind ([`ScopeKind::parent_table`]), each with
//! `tenant_id` and `active` columns. These are the rows the sequence
//! validators look up on every allocation. Callers pass ids already
//! checked by [`ScopeKind::parent_scope_ids`].

use folio_core::{ScopeId, TenantId};
use folio_sequence::ScopeKind;
use sqlx::PgPool;

fn insert_sql(kind: ScopeKind) -> String {
    let (table, columns) = (kind.parent_table(), kind.parent_key_columns());
    let placeholders = (1..=columns.len() + 2)
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {table} ({}, tenant_id, active) VALUES ({placeholders}) ON CONFLICT DO NOTHING",
        columns.join(", ")
    )
}

fn set_active_sql(kind: ScopeKind) -> String {
    let (table, columns) = (kind.parent_table(), kind.parent_key_columns());
    let predicate = columns
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{column} = ${}", i + 2))
        .collect::<Vec<_>>()
        .join(" AND ");
    format!(
        "UPDATE {table} SET active = $1 WHERE {predicate} AND tenant_id = ${}",
        columns.len() + 2
    )
}

/// Insert a parent scope. `Ok(false)` when the identifiers already exist.
pub async fn insert(
    pool: &PgPool,
    kind: ScopeKind,
    parent_ids: &[ScopeId],
    tenant: TenantId,
    active: bool,
) -> Result<bool, sqlx::Error> {
    let sql = insert_sql(kind);
    let mut query = sqlx::query(&sql);
    for id in parent_ids {
        query = query.bind(id.get());
    }
    let result = query
        .bind(tenant.get())
        .bind(active)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Set `active` on a parent scope owned by `tenant`. `Ok(false)` when no
/// such row exists for that tenant.
pub async fn set_active(
    pool: &PgPool,
    kind: ScopeKind,
    parent_ids: &[ScopeId],
    tenant: TenantId,
    active: bool,
) -> Result<bool, sqlx::Error> {
    let sql = set_active_sql(kind);
    let mut query = sqlx::query(&sql).bind(active);
    for id in parent_ids {
        query = query.bind(id.get());
    }
    let result = query.bind(tenant.get()).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_sql_lists_every_column() {
        assert_eq!(
            insert_sql(ScopeKind::CatalogItem),
            "INSERT INTO catalog_config_groups (catalog_config_id, group_id, tenant_id, active) \
             VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING"
        );
    }

    #[test]
    fn set_active_sql_scopes_by_tenant() {
        assert_eq!(
            set_active_sql(ScopeKind::InventoryMovement),
            "UPDATE movement_configs SET active = $1 WHERE id = $2 AND tenant_id = $3"
        );
    }
}
