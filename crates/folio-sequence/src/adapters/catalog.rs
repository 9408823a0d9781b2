//! Catalog item codes, numbered per (tenant, catalog configuration, group).

use std::fmt;

use folio_core::{ScopeId, TenantId};

use super::ScopedCodes;
use crate::error::SequenceError;
use crate::scope::{ScopeKey, ScopeKind};

/// Scope of a catalog item code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CatalogItemScope {
    tenant_id: TenantId,
    catalog_config_id: ScopeId,
    group_id: ScopeId,
}

impl CatalogItemScope {
    /// Build a key from raw identifiers; each must be positive.
    pub fn new(
        tenant_id: i64,
        catalog_config_id: i64,
        group_id: i64,
    ) -> Result<Self, SequenceError> {
        Self::required(Some(tenant_id), Some(catalog_config_id), Some(group_id))
    }

    /// Build a key from optional identifiers; each must be present and
    /// positive.
    pub fn required(
        tenant_id: Option<i64>,
        catalog_config_id: Option<i64>,
        group_id: Option<i64>,
    ) -> Result<Self, SequenceError> {
        let invalid = |e| SequenceError::invalid_ids(ScopeKind::CatalogItem, e);
        Ok(Self {
            tenant_id: TenantId::required(tenant_id).map_err(invalid)?,
            catalog_config_id: ScopeId::required("catalog_config_id", catalog_config_id)
                .map_err(invalid)?,
            group_id: ScopeId::required("group_id", group_id).map_err(invalid)?,
        })
    }

    /// Catalog configuration identifier.
    pub fn catalog_config_id(&self) -> ScopeId {
        self.catalog_config_id
    }

    /// Group identifier.
    pub fn group_id(&self) -> ScopeId {
        self.group_id
    }
}

impl fmt::Display for CatalogItemScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/catalog_config:{}/group:{}",
            self.tenant_id, self.catalog_config_id, self.group_id
        )
    }
}

impl ScopeKey for CatalogItemScope {
    const KIND: ScopeKind = ScopeKind::CatalogItem;

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn parent_ids(&self) -> Vec<ScopeId> {
        vec![self.catalog_config_id, self.group_id]
    }
}

/// Catalog item code allocation.
pub type CatalogItemCodes = ScopedCodes<CatalogItemScope>;

impl CatalogItemCodes {
    /// Next code for (tenant, catalog configuration, group).
    pub async fn allocate_next_code(
        &self,
        tenant_id: i64,
        catalog_config_id: i64,
        group_id: i64,
    ) -> Result<i64, SequenceError> {
        let scope = CatalogItemScope::new(tenant_id, catalog_config_id, group_id)?;
        self.allocate(&scope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDatabase;

    #[test]
    fn rejects_non_positive_group() {
        let err = CatalogItemScope::new(7, 3, 0).unwrap_err();
        assert!(err.is_invalid_scope());
        assert!(err.to_string().contains("group_id"));
    }

    #[test]
    fn rejects_missing_config() {
        let err = CatalogItemScope::required(Some(7), None, Some(9)).unwrap_err();
        assert!(err.to_string().contains("catalog_config_id is required"));
    }

    #[test]
    fn renders_all_parts() {
        let scope = CatalogItemScope::new(7, 3, 9).unwrap();
        assert_eq!(scope.to_string(), "tenant:7/catalog_config:3/group:9");
    }

    #[tokio::test]
    async fn invalid_ids_fail_before_store_access() {
        let db = MemoryDatabase::new();
        let codes = CatalogItemCodes::in_memory(&db);
        let err = codes.allocate_next_code(-1, 3, 9).await.unwrap_err();
        assert!(err.is_invalid_scope());
        assert_eq!(db.counter_rows(ScopeKind::CatalogItem), 0);
    }
}
