//! # Scope Kinds and Keys
//!
//! A scope partitions a sequence. Every key carries the tenant and one or
//! more parent configuration identifiers; the [`ScopeKind`] discriminator
//! fixes how many parents there are and where the counters live.

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use folio_core::{ScopeId, TenantId};
use serde::{Deserialize, Serialize};

use crate::error::SequenceError;

/// The kinds of record that receive scoped codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScopeKind {
    /// Catalog items, numbered per catalog configuration group.
    CatalogItem,
    /// Inventory movements, numbered per movement configuration.
    InventoryMovement,
    /// Generic entity records, numbered per entity-type-by-group configuration.
    EntityRecord,
}

impl ScopeKind {
    /// All kinds, in declaration order.
    pub const ALL: [ScopeKind; 3] = [
        ScopeKind::CatalogItem,
        ScopeKind::InventoryMovement,
        ScopeKind::EntityRecord,
    ];

    /// Kebab-case name used in URLs and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CatalogItem => "catalog-item",
            Self::InventoryMovement => "inventory-movement",
            Self::EntityRecord => "entity-record",
        }
    }

    /// Table holding this kind's counter rows.
    pub fn counter_table(self) -> &'static str {
        match self {
            Self::CatalogItem => "catalog_item_sequences",
            Self::InventoryMovement => "inventory_movement_sequences",
            Self::EntityRecord => "entity_record_sequences",
        }
    }

    /// Parent identifier columns, in key order. The tenant column is implied.
    pub fn parent_columns(self) -> &'static [&'static str] {
        match self {
            Self::CatalogItem => &["catalog_config_id", "group_id"],
            Self::InventoryMovement => &["movement_config_id"],
            Self::EntityRecord => &["type_by_group_id"],
        }
    }

    /// Number of parent identifiers a key of this kind carries.
    pub fn parent_arity(self) -> usize {
        self.parent_columns().len()
    }

    /// Table holding the parent configuration records.
    pub fn parent_table(self) -> &'static str {
        match self {
            Self::CatalogItem => "catalog_config_groups",
            Self::InventoryMovement => "movement_configs",
            Self::EntityRecord => "entity_type_groups",
        }
    }

    /// Key columns of [`parent_table`](Self::parent_table), paired one to
    /// one with [`parent_columns`](Self::parent_columns).
    pub fn parent_key_columns(self) -> &'static [&'static str] {
        match self {
            Self::CatalogItem => &["catalog_config_id", "group_id"],
            Self::InventoryMovement | Self::EntityRecord => &["id"],
        }
    }

    /// Validate raw parent identifiers for this kind: the count must match
    /// [`parent_arity`](Self::parent_arity) and each id must be positive.
    /// Errors name the offending column.
    pub fn parent_scope_ids(self, raw: &[i64]) -> Result<Vec<ScopeId>, SequenceError> {
        let columns = self.parent_columns();
        if raw.len() != columns.len() {
            return Err(SequenceError::InvalidScope {
                kind: self,
                scope: format!("{raw:?}"),
                reason: format!(
                    "{self} scopes take {} parent ids ({}), got {}",
                    columns.len(),
                    columns.join(", "),
                    raw.len()
                ),
            });
        }
        columns
            .iter()
            .zip(raw)
            .map(|(&column, &id)| {
                ScopeId::new(column, id).map_err(|e| SequenceError::invalid_ids(self, e))
            })
            .collect()
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown scope kind: {s}"))
    }
}

/// A scope key shape. Implementors are immutable values built through
/// validating constructors, so every id they hold is positive.
pub trait ScopeKey: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// The kind this key shape belongs to.
    const KIND: ScopeKind;

    /// Owning tenant.
    fn tenant_id(&self) -> TenantId;

    /// Parent identifiers, in [`ScopeKind::parent_columns`] order.
    fn parent_ids(&self) -> Vec<ScopeId>;
}

/// Verdict of a scope validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeStatus {
    /// Parent exists, is active and belongs to the tenant.
    Active,
    /// No parent record with these identifiers.
    Missing,
    /// Parent exists but has been deactivated.
    Inactive,
    /// Parent exists under a different tenant.
    TenantMismatch,
}

impl ScopeStatus {
    /// Derive the verdict from a looked-up parent `(owner, active)` pair.
    pub fn from_parent(tenant: TenantId, parent: Option<(i64, bool)>) -> Self {
        match parent {
            None => Self::Missing,
            Some((owner, _)) if owner != tenant.get() => Self::TenantMismatch,
            Some((_, false)) => Self::Inactive,
            Some((_, true)) => Self::Active,
        }
    }

    /// Reason logged when allocation is refused.
    pub fn reason(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Missing => "parent scope does not exist",
            Self::Inactive => "parent scope is inactive",
            Self::TenantMismatch => "parent scope belongs to another tenant",
        }
    }
}
