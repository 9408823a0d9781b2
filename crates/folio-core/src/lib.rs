//! # folio-core: Foundational Types for the Folio Backend
//!
//! Defines the identifier newtypes every other crate in the workspace
//! depends on. It depends on nothing internal.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for database identifiers.** A [`TenantId`] cannot be
//!    passed where a [`ScopeId`] is expected.
//!
//! 2. **Validated construction.** Identifiers are positive by construction.
//!    A missing, zero or negative id is rejected with a [`ValidationError`]
//!    naming the offending field.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `folio-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod identity;

pub use error::ValidationError;
pub use identity::{ScopeId, TenantId};
