//! Generic entity record codes, numbered per (tenant, entity type by group).

use std::fmt;

use folio_core::{ScopeId, TenantId};

use super::ScopedCodes;
use crate::error::SequenceError;
use crate::scope::{ScopeKey, ScopeKind};

/// Scope of an entity record code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityRecordScope {
    tenant_id: TenantId,
    type_by_group_id: ScopeId,
}

impl EntityRecordScope {
    /// Build a key from raw identifiers; each must be positive.
    pub fn new(tenant_id: i64, type_by_group_id: i64) -> Result<Self, SequenceError> {
        Self::required(Some(tenant_id), Some(type_by_group_id))
    }

    /// Build a key from optional identifiers.
    pub fn required(
        tenant_id: Option<i64>,
        type_by_group_id: Option<i64>,
    ) -> Result<Self, SequenceError> {
        let invalid = |e| SequenceError::invalid_ids(ScopeKind::EntityRecord, e);
        Ok(Self {
            tenant_id: TenantId::required(tenant_id).map_err(invalid)?,
            type_by_group_id: ScopeId::required("type_by_group_id", type_by_group_id)
                .map_err(invalid)?,
        })
    }

    /// Entity-type-by-group configuration identifier.
    pub fn type_by_group_id(&self) -> ScopeId {
        self.type_by_group_id
    }
}

impl fmt::Display for EntityRecordScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/type_by_group:{}", self.tenant_id, self.type_by_group_id)
    }
}

impl ScopeKey for EntityRecordScope {
    const KIND: ScopeKind = ScopeKind::EntityRecord;

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn parent_ids(&self) -> Vec<ScopeId> {
        vec![self.type_by_group_id]
    }
}

/// Entity record code allocation.
pub type EntityRecordCodes = ScopedCodes<EntityRecordScope>;

impl EntityRecordCodes {
    /// Next code for (tenant, entity type by group).
    pub async fn allocate_next_code(
        &self,
        tenant_id: i64,
        type_by_group_id: i64,
    ) -> Result<i64, SequenceError> {
        let scope = EntityRecordScope::new(tenant_id, type_by_group_id)?;
        self.allocate(&scope).await
    }
}
