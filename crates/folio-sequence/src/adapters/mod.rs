//! # Scope Adapters
//!
//! The three record families that receive scoped codes. Each adapter
//! contributes only a key shape; the allocation algorithm is always
//! [`SequenceAllocator`] behind a [`ScopedCodes`] handle, and the parent
//! lookup is driven by the key's [`ScopeKind`].
//!
//! | Adapter | Key | Parent record |
//! |---------|-----|---------------|
//! | [`CatalogItemCodes`] | tenant, catalog config, group | `catalog_config_groups` |
//! | [`InventoryMovementCodes`] | tenant, movement config | `movement_configs` |
//! | [`EntityRecordCodes`] | tenant, type-by-group config | `entity_type_groups` |
//!
//! New scoped numbering requirements add a key shape here rather than a
//! new allocation protocol.

mod catalog;
mod entity_record;
mod movement;

use std::fmt;
use std::sync::Arc;

use sqlx::PgPool;

use crate::allocator::{NextCode, SequenceAllocator};
use crate::error::SequenceError;
use crate::memory::{MemoryCounterStore, MemoryDatabase, MemoryScopeValidator};
use crate::postgres::{PgCounterStore, PgDatabase, PgScopeValidator};
use crate::scope::ScopeKey;

pub use catalog::{CatalogItemCodes, CatalogItemScope};
pub use entity_record::{EntityRecordCodes, EntityRecordScope};
pub use movement::{InventoryMovementCodes, InventoryMovementScope};

/// Code allocation for one key shape, over whichever backend it was built
/// with. Cheap to clone.
pub struct ScopedCodes<K: ScopeKey> {
    allocator: Arc<dyn NextCode<K>>,
}

impl<K: ScopeKey> Clone for ScopedCodes<K> {
    fn clone(&self) -> Self {
        Self {
            allocator: Arc::clone(&self.allocator),
        }
    }
}

impl<K: ScopeKey> fmt::Debug for ScopedCodes<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedCodes")
            .field("kind", &K::KIND)
            .finish_non_exhaustive()
    }
}

impl<K: ScopeKey> ScopedCodes<K> {
    /// Allocate against the in-memory backend.
    pub fn in_memory(db: &MemoryDatabase) -> Self {
        Self {
            allocator: Arc::new(SequenceAllocator::new(
                db.clone(),
                MemoryCounterStore,
                MemoryScopeValidator,
            )),
        }
    }

    /// Allocate against PostgreSQL.
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            allocator: Arc::new(SequenceAllocator::new(
                PgDatabase::new(pool),
                PgCounterStore,
                PgScopeValidator,
            )),
        }
    }

    /// Next code for an already validated key.
    pub async fn allocate(&self, scope: &K) -> Result<i64, SequenceError> {
        self.allocator.allocate_next_code(scope).await
    }
}
