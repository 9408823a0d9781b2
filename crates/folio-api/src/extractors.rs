//! # Custom Extractors & Validation
//!
//! Provides the [`Validate`] trait for request DTOs, helpers to extract and
//! validate JSON bodies, and the [`TenantContext`] extractor.

use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::Json;
use folio_core::TenantId;

use crate::auth::CallerIdentity;
use crate::error::AppError;

/// Header carrying the caller's tenant.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Trait for request types that can validate their business rules
/// beyond what serde deserialization checks.
pub trait Validate {
    /// Validate business rules. Returns an error message on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// The tenant a request acts for, read from the `X-Tenant-Id` header.
///
/// A missing or unparsable header is a 400; a zero or negative id is a 422.
/// When the caller's token is bound to a tenant, the header may be omitted
/// and any other tenant is a 403.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext(pub TenantId);

impl<S: Send + Sync> FromRequestParts<S> for TenantContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let bound = parts
            .extensions
            .get::<CallerIdentity>()
            .and_then(|caller| caller.tenant);
        let requested = header_tenant(parts)?;
        match (bound, requested) {
            (Some(bound), Some(requested)) if bound != requested => Err(AppError::Forbidden(
                format!("token is bound to tenant {bound}, not {requested}"),
            )),
            (_, Some(tenant)) | (Some(tenant), None) => Ok(Self(tenant)),
            (None, None) => Err(AppError::BadRequest("missing X-Tenant-Id header".into())),
        }
    }
}

fn header_tenant(parts: &Parts) -> Result<Option<TenantId>, AppError> {
    let Some(value) = parts.headers.get(TENANT_HEADER) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| AppError::BadRequest("X-Tenant-Id header is not valid text".into()))?;
    let id: i64 = raw
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("X-Tenant-Id is not an integer: {raw}")))?;
    Ok(Some(TenantId::new(id)?))
}
