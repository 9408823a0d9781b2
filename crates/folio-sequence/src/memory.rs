//! # In-Memory Backend
//!
//! A process-local store with the row semantics the allocator relies on:
//!
//! - Committed counter rows, unique per scope key.
//! - Exclusive per-row locks held by a transaction until it commits, rolls
//!   back or is dropped. A second locker waits (asynchronously) for release.
//! - Writes staged in the transaction and published only on commit.
//! - An insert of a key already committed fails with a uniqueness conflict.
//!   An insert racing an uncommitted insert of the same key waits for it
//!   and then conflicts, as PostgreSQL does.
//! - A fetch that finds no row holds no lock afterwards.
//!
//! It also keeps the registry of parent scopes that [`MemoryScopeValidator`]
//! consults. The API server runs on this backend when no database is
//! configured.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use folio_core::{ScopeId, TenantId};
use parking_lot::{Mutex, RwLock};
use tokio::sync::OwnedMutexGuard;

use crate::error::StoreError;
use crate::scope::{ScopeKey, ScopeKind, ScopeStatus};
use crate::store::{CounterRow, CounterStore, ScopeValidator, Transactional};

type RowId = (ScopeKind, i64, Vec<i64>);
type ParentKey = (ScopeKind, Vec<i64>);

fn raw_ids(ids: &[ScopeId]) -> Vec<i64> {
    ids.iter().map(|id| id.get()).collect()
}

fn row_id<K: ScopeKey>(scope: &K) -> RowId {
    (K::KIND, scope.tenant_id().get(), raw_ids(&scope.parent_ids()))
}

/// A parent configuration record as seen by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentScope {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Whether codes may currently be issued under it.
    pub active: bool,
}

#[derive(Default)]
struct Shared {
    rows: Mutex<HashMap<RowId, Option<i64>>>,
    // One lock per scope ever touched. Entries are never removed.
    locks: Mutex<HashMap<RowId, Arc<tokio::sync::Mutex<()>>>>,
    parents: RwLock<HashMap<ParentKey, ParentScope>>,
}

/// Shared handle to the in-memory database. Clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDatabase")
            .field("counter_rows", &self.shared.rows.lock().len())
            .field("parent_scopes", &self.shared.parents.read().len())
            .finish()
    }
}

impl MemoryDatabase {
    /// Create an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parent scope. Returns `false` if one with the same
    /// identifiers already exists (under any tenant).
    pub fn register_parent(
        &self,
        kind: ScopeKind,
        parent_ids: &[ScopeId],
        tenant_id: TenantId,
        active: bool,
    ) -> bool {
        let mut parents = self.shared.parents.write();
        let key = (kind, raw_ids(parent_ids));
        if parents.contains_key(&key) {
            return false;
        }
        parents.insert(key, ParentScope { tenant_id, active });
        true
    }

    /// Activate or deactivate a parent scope owned by `tenant_id`. Returns
    /// `false` when no such parent exists for that tenant.
    pub fn set_parent_active(
        &self,
        kind: ScopeKind,
        parent_ids: &[ScopeId],
        tenant_id: TenantId,
        active: bool,
    ) -> bool {
        let mut parents = self.shared.parents.write();
        match parents.get_mut(&(kind, raw_ids(parent_ids))) {
            Some(parent) if parent.tenant_id == tenant_id => {
                parent.active = active;
                true
            }
            _ => false,
        }
    }

    /// Look up a parent scope.
    pub fn parent(&self, kind: ScopeKind, parent_ids: &[ScopeId]) -> Option<ParentScope> {
        self.shared
            .parents
            .read()
            .get(&(kind, raw_ids(parent_ids)))
            .copied()
    }

    /// Committed `next_value` for `scope`: `None` if no row exists,
    /// `Some(None)` for a row holding null.
    pub fn counter_value<K: ScopeKey>(&self, scope: &K) -> Option<Option<i64>> {
        self.shared.rows.lock().get(&row_id(scope)).copied()
    }

    /// Number of committed counter rows of `kind`.
    pub fn counter_rows(&self, kind: ScopeKind) -> usize {
        self.shared
            .rows
            .lock()
            .keys()
            .filter(|(k, _, _)| *k == kind)
            .count()
    }

    /// Write a counter row directly, bypassing locks. For loading legacy
    /// data and for tests.
    pub fn seed_counter<K: ScopeKey>(&self, scope: &K, next_value: Option<i64>) {
        self.shared.rows.lock().insert(row_id(scope), next_value);
    }
}

/// An open in-memory transaction.
pub struct MemoryTx {
    shared: Arc<Shared>,
    held: HashMap<RowId, OwnedMutexGuard<()>>,
    staged: HashMap<RowId, Option<i64>>,
}

impl std::fmt::Debug for MemoryTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTx")
            .field("locks_held", &self.held.len())
            .field("staged_writes", &self.staged.len())
            .finish()
    }
}

impl MemoryTx {
    async fn lock(&mut self, id: &RowId) {
        if self.held.contains_key(id) {
            return;
        }
        let mutex = {
            let mut locks = self.shared.locks.lock();
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        let guard = mutex.lock_owned().await;
        self.held.insert(id.clone(), guard);
    }

    fn release_unless_staged(&mut self, id: &RowId) {
        if !self.staged.contains_key(id) {
            self.held.remove(id);
        }
    }

    fn visible(&self, id: &RowId) -> Option<Option<i64>> {
        match self.staged.get(id) {
            Some(value) => Some(*value),
            None => self.shared.rows.lock().get(id).copied(),
        }
    }
}

#[async_trait]
impl Transactional for MemoryDatabase {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        Ok(MemoryTx {
            shared: Arc::clone(&self.shared),
            held: HashMap::new(),
            staged: HashMap::new(),
        })
    }

    async fn commit(&self, mut tx: MemoryTx) -> Result<(), StoreError> {
        tx.shared.rows.lock().extend(tx.staged.drain());
        // Locks are released only once the writes are visible.
        drop(tx);
        Ok(())
    }

    async fn rollback(&self, tx: MemoryTx) -> Result<(), StoreError> {
        drop(tx);
        Ok(())
    }
}

/// Counter store over [`MemoryDatabase`]. Serves every scope kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryCounterStore;

#[async_trait]
impl<K: ScopeKey> CounterStore<K, MemoryTx> for MemoryCounterStore {
    async fn fetch_for_update(
        &self,
        tx: &mut MemoryTx,
        scope: &K,
    ) -> Result<Option<CounterRow<K>>, StoreError> {
        let id = row_id(scope);
        tx.lock(&id).await;
        match tx.visible(&id) {
            Some(next_value) => Ok(Some(CounterRow {
                scope: scope.clone(),
                next_value,
            })),
            None => {
                tx.release_unless_staged(&id);
                Ok(None)
            }
        }
    }

    async fn insert(
        &self,
        tx: &mut MemoryTx,
        scope: &K,
        next_value: i64,
    ) -> Result<CounterRow<K>, StoreError> {
        let id = row_id(scope);
        tx.lock(&id).await;
        if tx.visible(&id).is_some() {
            tx.release_unless_staged(&id);
            return Err(StoreError::UniqueViolation {
                collection: K::KIND.counter_table(),
                scope: scope.to_string(),
            });
        }
        tx.staged.insert(id, Some(next_value));
        Ok(CounterRow::new(scope.clone(), next_value))
    }

    async fn save(&self, tx: &mut MemoryTx, row: &CounterRow<K>) -> Result<(), StoreError> {
        let id = row_id(&row.scope);
        if !tx.held.contains_key(&id) {
            return Err(StoreError::NotLocked {
                scope: row.scope.to_string(),
            });
        }
        tx.staged.insert(id, row.next_value);
        Ok(())
    }
}

/// Validator over the parent registry of [`MemoryDatabase`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryScopeValidator;

#[async_trait]
impl<K: ScopeKey> ScopeValidator<K, MemoryTx> for MemoryScopeValidator {
    async fn check(&self, tx: &mut MemoryTx, scope: &K) -> Result<ScopeStatus, StoreError> {
        let key = (K::KIND, raw_ids(&scope.parent_ids()));
        let parent = tx
            .shared
            .parents
            .read()
            .get(&key)
            .map(|p| (p.tenant_id.get(), p.active));
        Ok(ScopeStatus::from_parent(scope.tenant_id(), parent))
    }
}
