//! # PostgreSQL Backend
//!
//! Counter rows live in one table per [`ScopeKind`]
//! (`catalog_item_sequences`, …), keyed by `tenant_id` plus the kind's
//! parent columns under a `UNIQUE` constraint. The row lock is
//! `SELECT … FOR UPDATE`.
//!
//! A unique violation aborts a PostgreSQL transaction, so the lazy insert
//! runs inside a savepoint. On SQLSTATE 23505 the savepoint is rolled back
//! and the transaction remains usable for the locked re-fetch.

use std::iter;

use async_trait::async_trait;
use folio_core::ScopeId;
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::StoreError;
use crate::scope::{ScopeKey, ScopeKind, ScopeStatus};
use crate::store::{CounterRow, CounterStore, ScopeValidator, Transactional};

/// Transaction type of the PostgreSQL backend.
pub type PgTx = Transaction<'static, Postgres>;

/// Transaction manager over a connection pool.
#[derive(Debug, Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Wrap a pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Transactional for PgDatabase {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, StoreError> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: PgTx) -> Result<(), StoreError> {
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self, tx: PgTx) -> Result<(), StoreError> {
        tx.rollback().await?;
        Ok(())
    }
}

fn key_columns(kind: ScopeKind) -> Vec<&'static str> {
    iter::once("tenant_id")
        .chain(kind.parent_columns().iter().copied())
        .collect()
}

/// `tenant_id = $n AND col = $n+1 …`, numbering from `first`.
fn key_predicate(kind: ScopeKind, first: usize) -> String {
    key_columns(kind)
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{column} = ${}", first + i))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn key_values<K: ScopeKey>(scope: &K) -> Vec<i64> {
    iter::once(scope.tenant_id().get())
        .chain(scope.parent_ids().into_iter().map(ScopeId::get))
        .collect()
}

/// Counter store over the per-kind sequence tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgCounterStore;

#[async_trait]
impl<K: ScopeKey> CounterStore<K, PgTx> for PgCounterStore {
    async fn fetch_for_update(
        &self,
        tx: &mut PgTx,
        scope: &K,
    ) -> Result<Option<CounterRow<K>>, StoreError> {
        let sql = format!(
            "SELECT next_value FROM {} WHERE {} FOR UPDATE",
            K::KIND.counter_table(),
            key_predicate(K::KIND, 1),
        );
        let mut query = sqlx::query_scalar::<_, Option<i64>>(&sql);
        for value in key_values(scope) {
            query = query.bind(value);
        }
        let found = query.fetch_optional(&mut **tx).await?;

        Ok(found.map(|next_value| CounterRow {
            scope: scope.clone(),
            next_value,
        }))
    }

    async fn insert(
        &self,
        tx: &mut PgTx,
        scope: &K,
        next_value: i64,
    ) -> Result<CounterRow<K>, StoreError> {
        let columns = key_columns(K::KIND);
        let placeholders = (1..=columns.len() + 1)
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}, next_value) VALUES ({})",
            K::KIND.counter_table(),
            columns.join(", "),
            placeholders,
        );

        sqlx::query("SAVEPOINT counter_insert")
            .execute(&mut **tx)
            .await?;

        let mut query = sqlx::query(&sql);
        for value in key_values(scope) {
            query = query.bind(value);
        }
        let inserted = query.bind(next_value).execute(&mut **tx).await;

        match inserted {
            Ok(_) => {
                sqlx::query("RELEASE SAVEPOINT counter_insert")
                    .execute(&mut **tx)
                    .await?;
                Ok(CounterRow::new(scope.clone(), next_value))
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                sqlx::query("ROLLBACK TO SAVEPOINT counter_insert")
                    .execute(&mut **tx)
                    .await?;
                Err(StoreError::UniqueViolation {
                    collection: K::KIND.counter_table(),
                    scope: scope.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, tx: &mut PgTx, row: &CounterRow<K>) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE {} SET next_value = $1 WHERE {}",
            K::KIND.counter_table(),
            key_predicate(K::KIND, 2),
        );
        let mut query = sqlx::query(&sql).bind(row.next_value);
        for value in key_values(&row.scope) {
            query = query.bind(value);
        }
        let result = query.execute(&mut **tx).await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RowMissing {
                scope: row.scope.to_string(),
            });
        }
        Ok(())
    }
}

/// `SELECT tenant_id, active` from the parent table of `kind`, binding the
/// parent ids as `$1…$n` in key order.
fn parent_lookup_sql(kind: ScopeKind) -> String {
    let predicate = kind
        .parent_key_columns()
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{column} = ${}", i + 1))
        .collect::<Vec<_>>()
        .join(" AND ");
    format!(
        "SELECT tenant_id, active FROM {} WHERE {predicate}",
        kind.parent_table()
    )
}

/// Validator over the parent configuration tables. Serves every scope kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgScopeValidator;

#[async_trait]
impl<K: ScopeKey> ScopeValidator<K, PgTx> for PgScopeValidator {
    async fn check(&self, tx: &mut PgTx, scope: &K) -> Result<ScopeStatus, StoreError> {
        let sql = parent_lookup_sql(K::KIND);
        let mut query = sqlx::query_as::<_, (i64, bool)>(&sql);
        for id in scope.parent_ids() {
            query = query.bind(id.get());
        }
        let parent = query.fetch_optional(&mut **tx).await?;
        Ok(ScopeStatus::from_parent(scope.tenant_id(), parent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::CatalogItemScope;

    #[test]
    fn predicate_numbers_placeholders_from_offset() {
        assert_eq!(
            key_predicate(ScopeKind::CatalogItem, 1),
            "tenant_id = $1 AND catalog_config_id = $2 AND group_id = $3"
        );
        assert_eq!(
            key_predicate(ScopeKind::InventoryMovement, 2),
            "tenant_id = $2 AND movement_config_id = $3"
        );
    }

    #[test]
    fn key_values_follow_column_order() {
        let scope = CatalogItemScope::new(7, 3, 9).unwrap();
        assert_eq!(key_values(&scope), vec![7, 3, 9]);
        assert_eq!(key_columns(ScopeKind::EntityRecord), vec!["tenant_id", "type_by_group_id"]);
    }

    #[test]
    fn parent_lookup_uses_parent_table_keys() {
        assert_eq!(
            parent_lookup_sql(ScopeKind::CatalogItem),
            "SELECT tenant_id, active FROM catalog_config_groups \
             WHERE catalog_config_id = $1 AND group_id = $2"
        );
        assert_eq!(
            parent_lookup_sql(ScopeKind::EntityRecord),
            "SELECT tenant_id, active FROM entity_type_groups WHERE id = $1"
        );
    }
}
