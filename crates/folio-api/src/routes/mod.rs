//! # API Route Modules
//!
//! - [`scopes`]: parent-scope registry (admin only).
//! - [`catalog_items`], [`movements`], [`entity_records`]: record creation,
//!   each drawing one code from its scoped sequence per new record.

pub mod catalog_items;
pub mod entity_records;
pub mod movements;
pub mod scopes;

use folio_core::TenantId;
use folio_sequence::{ScopeKind, SequenceError};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::metrics;
use crate::state::TenantOwned;

/// Turn an allocation result into an API result, recording the outcome.
pub(crate) fn issued(kind: ScopeKind, result: Result<i64, SequenceError>) -> Result<i64, AppError> {
    match result {
        Ok(code) => {
            metrics::record_code_issued(kind);
            Ok(code)
        }
        Err(err) => {
            metrics::record_allocation_failure(kind, &err);
            Err(err.into())
        }
    }
}

/// A record visible to `tenant`, or 404. Records of other tenants are
/// indistinguishable from missing ones.
pub(crate) fn visible_to<T: TenantOwned>(
    record: Option<T>,
    tenant: TenantId,
    what: &str,
    id: Uuid,
) -> Result<T, AppError> {
    record
        .filter(|r| r.tenant_id() == tenant.get())
        .ok_or_else(|| AppError::NotFound(format!("{what} {id} not found")))
}

/// Log and map a record write that failed after its code was issued.
pub(crate) fn persist_failed(kind: ScopeKind, code: i64, err: sqlx::Error) -> AppError {
    tracing::warn!(
        kind = %kind,
        code,
        error = %err,
        "record persist failed; issued code is forfeited"
    );
    AppError::Internal(format!("{kind} record persist failed: {err}"))
}
