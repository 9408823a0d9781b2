//! # Prometheus Metrics
//!
//! Metrics are emitted through the `metrics` facade and exported by
//! `metrics-exporter-prometheus`. Without an installed recorder every call
//! here is a no-op, which is how the test suite runs.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `folio_http_requests_total` | counter | method, path, status |
//! | `folio_http_request_duration_seconds` | histogram | method, path |
//! | `folio_sequence_codes_issued_total` | counter | kind |
//! | `folio_sequence_allocation_failures_total` | counter | kind, error |

use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use folio_sequence::{ScopeKind, SequenceError};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;

/// Install the global Prometheus recorder. Call once, before serving.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Middleware recording request counts and latency per matched route.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(
        "folio_http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "folio_http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(start.elapsed().as_secs_f64());

    response
}

/// Count a successfully issued code.
pub fn record_code_issued(kind: ScopeKind) {
    metrics::counter!("folio_sequence_codes_issued_total", "kind" => kind.as_str()).increment(1);
}

/// Count a failed allocation by error class.
pub fn record_allocation_failure(kind: ScopeKind, err: &SequenceError) {
    let class = match err {
        SequenceError::InvalidScope { .. } => "invalid_scope",
        SequenceError::FatalConsistency { .. } => "fatal_consistency",
        SequenceError::Exhausted { .. } => "exhausted",
        SequenceError::Store(_) => "store",
    };
    metrics::counter!(
        "folio_sequence_allocation_failures_total",
        "kind" => kind.as_str(),
        "error" => class
    )
    .increment(1);
}

/// GET /metrics: Prometheus text exposition.
pub async fn render(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_sequence::StoreError;

    #[test]
    fn recording_without_recorder_is_noop() {
        record_code_issued(ScopeKind::CatalogItem);
        record_allocation_failure(
            ScopeKind::EntityRecord,
            &SequenceError::from(StoreError::Unavailable("down".into())),
        );
    }

    #[tokio::test]
    async fn render_without_handle_is_not_found() {
        let response = render(State(AppState::new())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
