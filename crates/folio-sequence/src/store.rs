//! # Storage Seams
//!
//! The allocator is generic over three collaborators that share one
//! transaction type:
//!
//! - [`Transactional`] opens, commits and rolls back transactions.
//! - [`CounterStore`] reads, creates and writes counter rows inside one.
//! - [`ScopeValidator`] checks the parent scope inside the same one, so its
//!   verdict is linearizable with the row lock that follows.
//!
//! Dropping a transaction without committing must roll it back.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::scope::{ScopeKey, ScopeStatus};

/// Durable counter for one scope.
///
/// `next_value` is optional because legacy rows may hold `NULL`; the
/// allocator normalizes anything missing or below one before use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterRow<K> {
    /// Scope this row counts for.
    pub scope: K,
    /// Next code to issue.
    pub next_value: Option<i64>,
}

impl<K> CounterRow<K> {
    /// A row holding `next_value`.
    pub fn new(scope: K, next_value: i64) -> Self {
        Self {
            scope,
            next_value: Some(next_value),
        }
    }
}

/// Transaction manager.
#[async_trait]
pub trait Transactional: Send + Sync {
    /// Transaction handle. Dropping it uncommitted rolls it back.
    type Tx: Send;

    /// Open a transaction.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    /// Commit, publishing writes and releasing every lock held.
    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError>;

    /// Roll back, discarding writes and releasing every lock held.
    async fn rollback(&self, tx: Self::Tx) -> Result<(), StoreError>;
}

/// Counter rows for one scope kind.
#[async_trait]
pub trait CounterStore<K: ScopeKey, Tx: Send>: Send + Sync {
    /// Fetch the row for `scope`, taking an exclusive lock held until the
    /// transaction ends. Blocks while another transaction holds it.
    /// Returns `None` (and holds nothing) when no row exists.
    async fn fetch_for_update(
        &self,
        tx: &mut Tx,
        scope: &K,
    ) -> Result<Option<CounterRow<K>>, StoreError>;

    /// Create the row for `scope`. Fails with
    /// [`StoreError::UniqueViolation`] when a row already exists, leaving
    /// the transaction usable. The new row stays locked by `tx`.
    async fn insert(
        &self,
        tx: &mut Tx,
        scope: &K,
        next_value: i64,
    ) -> Result<CounterRow<K>, StoreError>;

    /// Persist a row previously fetched or inserted by `tx`.
    async fn save(&self, tx: &mut Tx, row: &CounterRow<K>) -> Result<(), StoreError>;
}

/// Read-only parent scope check.
#[async_trait]
pub trait ScopeValidator<K: ScopeKey, Tx: Send>: Send + Sync {
    /// Report whether the parent of `scope` exists, is active and belongs
    /// to the scope's tenant.
    async fn check(&self, tx: &mut Tx, scope: &K) -> Result<ScopeStatus, StoreError>;
}
