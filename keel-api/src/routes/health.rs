//! Health Check Endpoints
//!
//! Kubernetes-compatible probes:
//! - /health/live - Process alive check
//! - /health/ready - Storage round-trip check
//!
//! No authentication required for health endpoints.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use keel_storage::RecordStore;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthDetails {
    pub storage: ComponentHealth,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/live - Process liveness check
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive", body = HealthResponse),
    ),
)]
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready - Readiness check (storage round-trip)
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse),
        (status = 503, description = "Service is not ready", body = HealthResponse),
    ),
)]
pub async fn readiness(
    State(store): State<Arc<dyn RecordStore>>,
    State(start_time): State<Instant>,
) -> impl IntoResponse {
    let storage = check_storage(store.as_ref()).await;
    let status = storage.status;

    let response = HealthResponse {
        status,
        message: None,
        details: Some(HealthDetails {
            storage,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: start_time.elapsed().as_secs(),
        }),
    };

    let status_code = if status == HealthStatus::Healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response))
}

async fn check_storage(store: &dyn RecordStore) -> ComponentHealth {
    let start = Instant::now();
    match store.ping().await {
        Ok(()) => ComponentHealth {
            status: HealthStatus::Healthy,
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            ComponentHealth {
                status: HealthStatus::Unhealthy,
                latency_ms: None,
                error: Some(format!("Storage check failed: {}", e)),
            }
        }
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router (no auth required)
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: HealthStatus::Healthy,
            message: Some("Process is alive".to_string()),
            details: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "healthy");
        assert!(json.get("details").is_none());
    }
}
