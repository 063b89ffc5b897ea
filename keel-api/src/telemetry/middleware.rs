//! Axum Middleware for HTTP Request Tracing and Metrics
//!
//! Wraps every request in an `http_request` span, records Prometheus metrics
//! and logs one line per completed request.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::metrics::metrics;

/// Route template for metric labels.
///
/// Prefers the matched route (`/api/v1/pages/:id`); unmatched paths get UUID
/// segments replaced so label cardinality stays bounded.
fn route_label(request: &Request) -> String {
    if let Some(matched) = request.extensions().get::<MatchedPath>() {
        return matched.as_str().to_string();
    }
    normalize_path(request.uri().path())
}

fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if Uuid::parse_str(segment).is_ok() || (!segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Observability middleware for Axum.
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = route_label(&request);

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.route = %route,
        tenant_id = tracing::field::Empty,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status();
    if let Some(metrics) = metrics() {
        metrics.record_http_request(method.as_str(), &route, status.as_u16(), duration.as_secs_f64());
    }

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            "Request failed"
        );
    } else {
        tracing::info!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            "Request completed"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/pages/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/pages/{id}");
    }

    #[test]
    fn test_normalize_path_mixed() {
        let path = "/api/v1/features/550e8400-e29b-41d4-a716-446655440000/releases/123";
        assert_eq!(normalize_path(path), "/api/v1/features/{id}/releases/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/health/ready"), "/health/ready");
        assert_eq!(normalize_path("/api/v1/pages/tree"), "/api/v1/pages/tree");
    }
}
