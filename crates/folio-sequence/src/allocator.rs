//! # Sequence Allocator
//!
//! One algorithm for every scope kind. Each call runs in its own
//! transaction:
//!
//! 1. Check the parent scope. Anything but [`ScopeStatus::Active`] is
//!    `InvalidScope`, and nothing has been written.
//! 2. Fetch the counter row under an exclusive lock.
//! 3. If absent, insert it with [`FIRST_CODE`]. On a uniqueness conflict
//!    (another transaction created it first and committed) fetch again
//!    under lock, exactly once. A second miss is `FatalConsistency`.
//! 4. Normalize a missing or sub-one `next_value` to [`FIRST_CODE`].
//! 5. Take `code = next_value`, store `code + 1` while still locked.
//! 6. Commit, then hand `code` back.
//!
//! Concurrent calls on one scope serialize on the row lock, so codes follow
//! commit order. Any failure before commit rolls the whole transaction
//! back, increment included.

use std::marker::PhantomData;

use async_trait::async_trait;

use crate::error::{SequenceError, StoreError};
use crate::scope::{ScopeKey, ScopeStatus};
use crate::store::{CounterRow, CounterStore, ScopeValidator, Transactional};

/// First code issued in a fresh scope.
pub const FIRST_CODE: i64 = 1;

/// Issues codes for one scope key shape.
#[async_trait]
pub trait NextCode<K: ScopeKey>: Send + Sync {
    /// Issue the next code for `scope`. The returned code is committed and
    /// will never be issued again for this scope.
    async fn allocate_next_code(&self, scope: &K) -> Result<i64, SequenceError>;
}

/// The allocator, generic over key shape, transaction manager, counter
/// store and scope validator.
pub struct SequenceAllocator<K, D, S, V> {
    db: D,
    store: S,
    validator: V,
    _scope: PhantomData<fn() -> K>,
}

impl<K, D, S, V> std::fmt::Debug for SequenceAllocator<K, D, S, V>
where
    K: ScopeKey,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceAllocator")
            .field("kind", &K::KIND)
            .finish_non_exhaustive()
    }
}

impl<K, D, S, V> SequenceAllocator<K, D, S, V>
where
    K: ScopeKey,
    D: Transactional,
    S: CounterStore<K, D::Tx>,
    V: ScopeValidator<K, D::Tx>,
{
    /// Wire an allocator from its three collaborators.
    pub fn new(db: D, store: S, validator: V) -> Self {
        Self {
            db,
            store,
            validator,
            _scope: PhantomData,
        }
    }

    async fn allocate_in(&self, tx: &mut D::Tx, scope: &K) -> Result<i64, SequenceError> {
        let status = self.validator.check(tx, scope).await?;
        if status != ScopeStatus::Active {
            tracing::info!(
                kind = %K::KIND,
                scope = %scope,
                reason = status.reason(),
                "sequence allocation refused"
            );
            return Err(SequenceError::InvalidScope {
                kind: K::KIND,
                scope: scope.to_string(),
                reason: "parent scope is not available to this tenant".to_string(),
            });
        }

        let mut row = match self.store.fetch_for_update(tx, scope).await? {
            Some(row) => row,
            None => self.create_row(tx, scope).await?,
        };

        let code = match row.next_value {
            Some(value) if value >= FIRST_CODE => value,
            legacy => {
                tracing::warn!(
                    kind = %K::KIND,
                    scope = %scope,
                    stored = ?legacy,
                    "counter row holds no usable value, restarting at the first code"
                );
                FIRST_CODE
            }
        };
        let next = code.checked_add(1).ok_or_else(|| SequenceError::Exhausted {
            kind: K::KIND,
            scope: scope.to_string(),
        })?;
        row.next_value = Some(next);
        self.store.save(tx, &row).await?;

        Ok(code)
    }

    async fn create_row(&self, tx: &mut D::Tx, scope: &K) -> Result<CounterRow<K>, SequenceError> {
        match self.store.insert(tx, scope, FIRST_CODE).await {
            Ok(row) => Ok(row),
            Err(conflict @ StoreError::UniqueViolation { .. }) => {
                tracing::debug!(
                    kind = %K::KIND,
                    scope = %scope,
                    "counter row created concurrently, fetching it under lock"
                );
                match self.store.fetch_for_update(tx, scope).await? {
                    Some(row) => Ok(row),
                    None => {
                        tracing::error!(
                            kind = %K::KIND,
                            scope = %scope,
                            "counter row missing after uniqueness conflict"
                        );
                        Err(SequenceError::FatalConsistency {
                            kind: K::KIND,
                            scope: scope.to_string(),
                            source: conflict,
                        })
                    }
                }
            }
            Err(other) => Err(other.into()),
        }
    }
}

#[async_trait]
impl<K, D, S, V> NextCode<K> for SequenceAllocator<K, D, S, V>
where
    K: ScopeKey,
    D: Transactional,
    S: CounterStore<K, D::Tx>,
    V: ScopeValidator<K, D::Tx>,
{
    async fn allocate_next_code(&self, scope: &K) -> Result<i64, SequenceError> {
        let mut tx = self.db.begin().await?;
        match self.allocate_in(&mut tx, scope).await {
            Ok(code) => {
                self.db.commit(tx).await?;
                tracing::debug!(kind = %K::KIND, scope = %scope, code, "issued sequence code");
                Ok(code)
            }
            Err(err) => {
                if let Err(rollback_err) = self.db.rollback(tx).await {
                    tracing::warn!(
                        kind = %K::KIND,
                        scope = %scope,
                        error = %rollback_err,
                        "rollback after failed allocation also failed"
                    );
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use folio_core::{ScopeId, TenantId};

    use super::*;
    use crate::adapters::CatalogItemScope;
    use crate::memory::{MemoryCounterStore, MemoryDatabase, MemoryScopeValidator, MemoryTx};
    use crate::scope::ScopeKind;

    fn scope(tenant: i64, config: i64, group: i64) -> CatalogItemScope {
        CatalogItemScope::new(tenant, config, group).unwrap()
    }

    fn register(db: &MemoryDatabase, s: &CatalogItemScope) {
        db.register_parent(
            ScopeKind::CatalogItem,
            &s.parent_ids(),
            s.tenant_id(),
            true,
        );
    }

    fn allocator<S>(
        db: &MemoryDatabase,
        store: S,
    ) -> SequenceAllocator<CatalogItemScope, MemoryDatabase, S, MemoryScopeValidator>
    where
        S: CounterStore<CatalogItemScope, MemoryTx>,
    {
        SequenceAllocator::new(db.clone(), store, MemoryScopeValidator)
    }

    /// Counts calls and can hide rows from the first fetch or fail inserts.
    #[derive(Clone, Default)]
    struct ScriptedStore {
        fetches: Arc<AtomicUsize>,
        inserts: Arc<AtomicUsize>,
        hide_first_fetch: bool,
        hide_every_fetch: bool,
        insert_conflicts: bool,
        insert_unavailable: bool,
    }

    #[async_trait]
    impl CounterStore<CatalogItemScope, MemoryTx> for ScriptedStore {
        async fn fetch_for_update(
            &self,
            tx: &mut MemoryTx,
            scope: &CatalogItemScope,
        ) -> Result<Option<CounterRow<CatalogItemScope>>, StoreError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.hide_every_fetch || (self.hide_first_fetch && n == 0) {
                return Ok(None);
            }
            MemoryCounterStore.fetch_for_update(tx, scope).await
        }

        async fn insert(
            &self,
            tx: &mut MemoryTx,
            scope: &CatalogItemScope,
            next_value: i64,
        ) -> Result<CounterRow<CatalogItemScope>, StoreError> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            if self.insert_unavailable {
                return Err(StoreError::Unavailable("connection reset".into()));
            }
            if self.insert_conflicts {
                return Err(StoreError::UniqueViolation {
                    collection: ScopeKind::CatalogItem.counter_table(),
                    scope: scope.to_string(),
                });
            }
            MemoryCounterStore.insert(tx, scope, next_value).await
        }

        async fn save(
            &self,
            tx: &mut MemoryTx,
            row: &CounterRow<CatalogItemScope>,
        ) -> Result<(), StoreError> {
            MemoryCounterStore.save(tx, row).await
        }
    }

    #[tokio::test]
    async fn first_allocation_creates_row_at_one() {
        let db = MemoryDatabase::new();
        let s = scope(7, 3, 9);
        register(&db, &s);
        let alloc = allocator(&db, MemoryCounterStore);

        assert_eq!(alloc.allocate_next_code(&s).await.unwrap(), 1);
        assert_eq!(db.counter_value(&s), Some(Some(2)));
    }

    #[tokio::test]
    async fn conflict_recovers_with_single_locked_refetch() {
        let db = MemoryDatabase::new();
        let s = scope(7, 3, 9);
        register(&db, &s);
        // Another caller already created and committed the row.
        allocator(&db, MemoryCounterStore)
            .allocate_next_code(&s)
            .await
            .unwrap();

        let store = ScriptedStore {
            hide_first_fetch: true,
            ..Default::default()
        };
        let alloc = allocator(&db, store.clone());

        assert_eq!(alloc.allocate_next_code(&s).await.unwrap(), 2);
        assert_eq!(store.inserts.load(Ordering::SeqCst), 1);
        assert_eq!(store.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(db.counter_value(&s), Some(Some(3)));
    }

    #[tokio::test]
    async fn conflict_without_row_is_fatal_and_not_retried() {
        let db = MemoryDatabase::new();
        let s = scope(7, 3, 9);
        register(&db, &s);
        let store = ScriptedStore {
            hide_every_fetch: true,
            insert_conflicts: true,
            ..Default::default()
        };
        let alloc = allocator(&db, store.clone());

        let err = alloc.allocate_next_code(&s).await.unwrap_err();
        match err {
            SequenceError::FatalConsistency { kind, source, .. } => {
                assert_eq!(kind, ScopeKind::CatalogItem);
                assert!(source.is_unique_violation());
            }
            other => panic!("expected FatalConsistency, got {other:?}"),
        }
        assert_eq!(store.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(store.inserts.load(Ordering::SeqCst), 1);
        assert_eq!(db.counter_value(&s), None);
    }

    #[tokio::test]
    async fn other_insert_errors_propagate_without_refetch() {
        let db = MemoryDatabase::new();
        let s = scope(7, 3, 9);
        register(&db, &s);
        let store = ScriptedStore {
            insert_unavailable: true,
            ..Default::default()
        };
        let alloc = allocator(&db, store.clone());

        let err = alloc.allocate_next_code(&s).await.unwrap_err();
        assert!(
            matches!(err, SequenceError::Store(StoreError::Unavailable(_))),
            "got {err:?}"
        );
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_scope_touches_no_counter() {
        let db = MemoryDatabase::new();
        let s = scope(7, 3, 9);
        let store = ScriptedStore::default();
        let alloc = allocator(&db, store.clone());

        let err = alloc.allocate_next_code(&s).await.unwrap_err();
        assert!(err.is_invalid_scope());
        assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(store.inserts.load(Ordering::SeqCst), 0);
        assert_eq!(db.counter_rows(ScopeKind::CatalogItem), 0);
    }

    #[tokio::test]
    async fn legacy_null_counter_restarts_at_one() {
        let db = MemoryDatabase::new();
        let s = scope(7, 3, 9);
        register(&db, &s);
        db.seed_counter(&s, None);
        let alloc = allocator(&db, MemoryCounterStore);

        assert_eq!(alloc.allocate_next_code(&s).await.unwrap(), 1);
        assert_eq!(alloc.allocate_next_code(&s).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn legacy_negative_counter_restarts_at_one() {
        let db = MemoryDatabase::new();
        let s = scope(7, 3, 9);
        register(&db, &s);
        db.seed_counter(&s, Some(-4));
        let alloc = allocator(&db, MemoryCounterStore);

        assert_eq!(alloc.allocate_next_code(&s).await.unwrap(), 1);
        assert_eq!(db.counter_value(&s), Some(Some(2)));
    }

    #[tokio::test]
    async fn exhausted_counter_is_left_untouched() {
        let db = MemoryDatabase::new();
        let s = scope(7, 3, 9);
        register(&db, &s);
        db.seed_counter(&s, Some(i64::MAX));
        let alloc = allocator(&db, MemoryCounterStore);

        let err = alloc.allocate_next_code(&s).await.unwrap_err();
        assert!(matches!(err, SequenceError::Exhausted { .. }), "got {err:?}");
        assert_eq!(db.counter_value(&s), Some(Some(i64::MAX)));
    }

    #[tokio::test]
    async fn failed_save_rolls_back_increment() {
        #[derive(Clone, Copy)]
        struct FailingSave;

        #[async_trait]
        impl CounterStore<CatalogItemScope, MemoryTx> for FailingSave {
            async fn fetch_for_update(
                &self,
                tx: &mut MemoryTx,
                scope: &CatalogItemScope,
            ) -> Result<Option<CounterRow<CatalogItemScope>>, StoreError> {
                MemoryCounterStore.fetch_for_update(tx, scope).await
            }

            async fn insert(
                &self,
                tx: &mut MemoryTx,
                scope: &CatalogItemScope,
                next_value: i64,
            ) -> Result<CounterRow<CatalogItemScope>, StoreError> {
                MemoryCounterStore.insert(tx, scope, next_value).await
            }

            async fn save(
                &self,
                _tx: &mut MemoryTx,
                _row: &CounterRow<CatalogItemScope>,
            ) -> Result<(), StoreError> {
                Err(StoreError::Unavailable("disk full".into()))
            }
        }

        let db = MemoryDatabase::new();
        let s = scope(7, 3, 9);
        register(&db, &s);

        assert!(allocator(&db, FailingSave).allocate_next_code(&s).await.is_err());
        // The lazily inserted row was rolled back along with everything else.
        assert_eq!(db.counter_value(&s), None);

        let alloc = allocator(&db, MemoryCounterStore);
        assert_eq!(alloc.allocate_next_code(&s).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn validator_sees_tenant_of_key() {
        let db = MemoryDatabase::new();
        let owned = scope(7, 3, 9);
        register(&db, &owned);
        let alloc = allocator(&db, MemoryCounterStore);

        let foreign = scope(8, 3, 9);
        assert!(alloc
            .allocate_next_code(&foreign)
            .await
            .unwrap_err()
            .is_invalid_scope());
        assert_eq!(
            db.parent(ScopeKind::CatalogItem, &owned.parent_ids())
                .map(|p| p.tenant_id),
            Some(TenantId::new(7).unwrap())
        );
        assert_eq!(owned.parent_ids(), vec![
            ScopeId::new("catalog_config_id", 3).unwrap(),
            ScopeId::new("group_id", 9).unwrap(),
        ]);
    }
}
