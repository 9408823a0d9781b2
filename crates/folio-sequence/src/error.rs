//! # Sequence Errors
//!
//! Two layers: [`StoreError`] is what a counter store or transaction
//! manager reports, [`SequenceError`] is what callers of the allocator see.
//!
//! Only [`StoreError::UniqueViolation`] has meaning to the allocator (it
//! triggers the single locked re-fetch). Every other store error passes
//! through unchanged as [`SequenceError::Store`].

use folio_core::ValidationError;
use thiserror::Error;

use crate::scope::ScopeKind;

/// Errors raised by counter stores, validators and transaction managers.
#[derive(Error, Debug)]
pub enum StoreError {
    /// An insert collided with an existing row for the same scope key.
    #[error("uniqueness conflict in {collection} for scope {scope}")]
    UniqueViolation {
        /// Counter collection (table) name.
        collection: &'static str,
        /// Rendered scope key.
        scope: String,
    },

    /// A save was attempted on a row this transaction does not hold locked.
    #[error("counter row for scope {scope} is not locked by this transaction")]
    NotLocked {
        /// Rendered scope key.
        scope: String,
    },

    /// A save matched no row.
    #[error("counter row for scope {scope} disappeared before save")]
    RowMissing {
        /// Rendered scope key.
        scope: String,
    },

    /// The store could not serve the request (connectivity, shutdown).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Database driver error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Whether this error is a storage-level uniqueness rejection.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }
}

/// Errors returned by [`crate::NextCode::allocate_next_code`].
#[derive(Error, Debug)]
pub enum SequenceError {
    /// Identifiers were missing or non-positive, or the parent scope does
    /// not exist, is inactive, or belongs to another tenant. No counter was
    /// touched.
    #[error("invalid {kind} scope {scope}: {reason}")]
    InvalidScope {
        /// Scope kind requested.
        kind: ScopeKind,
        /// Rendered scope key, or the raw input when no key could be built.
        scope: String,
        /// Why the scope was rejected.
        reason: String,
    },

    /// The locked re-fetch after a uniqueness conflict found no row. The
    /// backing store violated its isolation contract.
    #[error("{kind} counter for scope {scope} missing after uniqueness conflict: {source}")]
    FatalConsistency {
        /// Scope kind requested.
        kind: ScopeKind,
        /// Rendered scope key.
        scope: String,
        /// The original conflict.
        #[source]
        source: StoreError,
    },

    /// The counter reached `i64::MAX`; no further codes can be issued.
    #[error("{kind} sequence for scope {scope} is exhausted")]
    Exhausted {
        /// Scope kind requested.
        kind: ScopeKind,
        /// Rendered scope key.
        scope: String,
    },

    /// Any other store failure, propagated unmodified.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SequenceError {
    /// Build an `InvalidScope` error from an identifier validation failure.
    pub fn invalid_ids(kind: ScopeKind, err: ValidationError) -> Self {
        Self::InvalidScope {
            kind,
            scope: "-".to_string(),
            reason: err.to_string(),
        }
    }

    /// Whether this error is an `InvalidScope` rejection.
    pub fn is_invalid_scope(&self) -> bool {
        matches!(self, Self::InvalidScope { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_is_recognised() {
        let err = StoreError::UniqueViolation {
            collection: "catalog_item_sequences",
            scope: "tenant:7/3/9".into(),
        };
        assert!(err.is_unique_violation());
        assert!(!StoreError::Unavailable("down".into()).is_unique_violation());
    }

    #[test]
    fn invalid_ids_carries_field_name() {
        let err = SequenceError::invalid_ids(
            ScopeKind::CatalogItem,
            ValidationError::NonPositiveId {
                field: "group_id",
                value: 0,
            },
        );
        assert!(err.is_invalid_scope());
        let msg = err.to_string();
        assert!(msg.contains("catalog-item"), "got: {msg}");
        assert!(msg.contains("group_id"), "got: {msg}");
    }

    #[test]
    fn store_errors_pass_through_transparently() {
        let err = SequenceError::from(StoreError::Unavailable("connection reset".into()));
        assert_eq!(err.to_string(), "store unavailable: connection reset");
    }
}
