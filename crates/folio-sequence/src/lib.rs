//! # folio-sequence: Scoped Sequence Allocation
//!
//! Issues strictly increasing, never-duplicated integer codes to business
//! records. Codes are partitioned by a scope key: the tenant plus one or
//! more parent configuration identifiers. Uniqueness holds within a scope
//! only; scopes are fully independent.
//!
//! ## Components (leaves first)
//!
//! - **Scope validator** ([`ScopeValidator`]): confirms the parent
//!   configuration exists, is active and belongs to the tenant. Runs on
//!   every allocation, inside the allocation transaction.
//! - **Counter store** ([`CounterStore`]): one row per scope holding the
//!   next value, created lazily, read under an exclusive row lock.
//! - **Allocator** ([`SequenceAllocator`]): validate, lock or create,
//!   read-increment-persist, commit.
//! - **Adapters** ([`adapters`]): catalog items, inventory movements and
//!   entity records. Each supplies only a key shape; all share
//!   [`ScopedCodes`] and the algorithm.
//!
//! ## Backends
//!
//! - [`memory`]: in-process store with real row-lock semantics, used in
//!   development mode and by the test suite.
//! - [`postgres`]: `SELECT … FOR UPDATE` over SQLx, with a savepoint around
//!   the lazy insert so a uniqueness conflict can be recovered in place.
//!
//! ## Gaps
//!
//! Numbering is not gapless. A code is issued once its transaction commits;
//! if the caller then fails to persist its record, that code is forfeited.

pub mod adapters;
pub mod allocator;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod scope;
pub mod store;

pub use adapters::{
    CatalogItemCodes, CatalogItemScope, EntityRecordCodes, EntityRecordScope,
    InventoryMovementCodes, InventoryMovementScope, ScopedCodes,
};
pub use allocator::{NextCode, SequenceAllocator, FIRST_CODE};
pub use error::{SequenceError, StoreError};
pub use memory::{MemoryCounterStore, MemoryDatabase, MemoryScopeValidator, MemoryTx, ParentScope};
pub use postgres::{PgCounterStore, PgDatabase, PgScopeValidator};
pub use scope::{ScopeKey, ScopeKind, ScopeStatus};
pub use store::{CounterRow, CounterStore, ScopeValidator, Transactional};
