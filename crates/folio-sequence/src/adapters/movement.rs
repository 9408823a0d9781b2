//! Inventory movement codes, numbered per (tenant, movement configuration).

use std::fmt;

use folio_core::{ScopeId, TenantId};

use super::ScopedCodes;
use crate::error::SequenceError;
use crate::scope::{ScopeKey, ScopeKind};

/// Scope of an inventory movement code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InventoryMovementScope {
    tenant_id: TenantId,
    movement_config_id: ScopeId,
}

impl InventoryMovementScope {
    /// Build a key from raw identifiers; each must be positive.
    pub fn new(tenant_id: i64, movement_config_id: i64) -> Result<Self, SequenceError> {
        Self::required(Some(tenant_id), Some(movement_config_id))
    }

    /// Build a key from optional identifiers.
    pub fn required(
        tenant_id: Option<i64>,
        movement_config_id: Option<i64>,
    ) -> Result<Self, SequenceError> {
        let invalid = |e| SequenceError::invalid_ids(ScopeKind::InventoryMovement, e);
        Ok(Self {
            tenant_id: TenantId::required(tenant_id).map_err(invalid)?,
            movement_config_id: ScopeId::required("movement_config_id", movement_config_id)
                .map_err(invalid)?,
        })
    }

    /// Movement configuration identifier.
    pub fn movement_config_id(&self) -> ScopeId {
        self.movement_config_id
    }
}

impl fmt::Display for InventoryMovementScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/movement_config:{}", self.tenant_id, self.movement_config_id)
    }
}

impl ScopeKey for InventoryMovementScope {
    const KIND: ScopeKind = ScopeKind::InventoryMovement;

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn parent_ids(&self) -> Vec<ScopeId> {
        vec![self.movement_config_id]
    }
}

/// Inventory movement code allocation.
pub type InventoryMovementCodes = ScopedCodes<InventoryMovementScope>;

impl InventoryMovementCodes {
    /// Next code for (tenant, movement configuration).
    pub async fn allocate_next_code(
        &self,
        tenant_id: i64,
        movement_config_id: i64,
    ) -> Result<i64, SequenceError> {
        let scope = InventoryMovementScope::new(tenant_id, movement_config_id)?;
        self.allocate(&scope).await
    }
}
