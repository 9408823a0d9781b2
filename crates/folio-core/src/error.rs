//! # Validation Errors
//!
//! Errors raised when raw identifiers fail the constraints of the
//! domain newtypes. Each variant carries the field name so that callers can
//! report exactly which input was wrong.

use thiserror::Error;

/// Validation errors for identifier newtypes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required identifier was not supplied.
    #[error("{field} is required")]
    MissingId {
        /// Name of the missing field.
        field: &'static str,
    },

    /// An identifier was zero or negative.
    #[error("{field} must be a positive integer, got {value}")]
    NonPositiveId {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: i64,
    },
}
