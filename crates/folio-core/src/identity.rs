//! # Identifier Newtypes
//!
//! Database identifiers used to partition business data. Tenants own
//! everything; scope identifiers name the parent configuration records
//! (catalog groups, movement configurations, entity type groups) under a
//! tenant.
//!
//! Both types wrap a strictly positive `i64`. There is no way to build one
//! holding zero or a negative number, so code receiving a `TenantId` never
//! re-checks it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Identifier of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct TenantId(i64);

/// Identifier of a parent configuration record that partitions a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ScopeId(i64);

fn positive(field: &'static str, value: i64) -> Result<i64, ValidationError> {
    if value > 0 {
        Ok(value)
    } else {
        Err(ValidationError::NonPositiveId { field, value })
    }
}

impl TenantId {
    /// Validate a raw tenant identifier.
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        positive("tenant_id", value).map(Self)
    }

    /// Validate an optional raw tenant identifier; `None` is rejected.
    pub fn required(value: Option<i64>) -> Result<Self, ValidationError> {
        value
            .ok_or(ValidationError::MissingId { field: "tenant_id" })
            .and_then(Self::new)
    }

    /// The raw identifier.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl ScopeId {
    /// Validate a raw scope identifier. `field` names the column for errors.
    pub fn new(field: &'static str, value: i64) -> Result<Self, ValidationError> {
        positive(field, value).map(Self)
    }

    /// Validate an optional raw scope identifier; `None` is rejected.
    pub fn required(field: &'static str, value: Option<i64>) -> Result<Self, ValidationError> {
        value
            .ok_or(ValidationError::MissingId { field })
            .and_then(|v| Self::new(field, v))
    }

    /// The raw identifier.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for TenantId {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i64> for ScopeId {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new("scope_id", value)
    }
}

impl From<TenantId> for i64 {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl From<ScopeId> for i64 {
    fn from(id: ScopeId) -> Self {
        id.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tenant:{}", self.0)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
