//! Prometheus Metrics Definitions
//!
//! Keel metrics live in the default Prometheus registry (which also carries
//! the process collector) and are exposed on `/metrics`.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Encoder,
    Histogram, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Agent function latency buckets (seconds)
const AGENT_LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.0];

/// Tool rounds per chat turn
const CHAT_ROUND_BUCKETS: &[f64] = &[0.0, 1.0, 2.0, 3.0, 4.0, 6.0, 8.0, 12.0, 16.0];

/// Global metrics instance, registered on first use.
pub static METRICS: Lazy<ApiResult<KeelMetrics>> = Lazy::new(KeelMetrics::new);

/// The registered metrics, or `None` if registration failed at startup.
pub fn metrics() -> Option<&'static KeelMetrics> {
    METRICS.as_ref().ok()
}

fn register_error(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

/// Container for all Keel metrics.
#[derive(Clone)]
pub struct KeelMetrics {
    /// labels: method, path, status
    pub http_requests_total: CounterVec,

    /// labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// labels: function, outcome (ok or the agent error code)
    pub agent_calls_total: CounterVec,

    /// labels: function
    pub agent_call_duration_seconds: HistogramVec,

    /// Tool-call rounds used by each chat turn
    pub chat_rounds: Histogram,

    /// labels: outcome (complete, truncated, error)
    pub chat_turns_total: CounterVec,
}

impl KeelMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "keel_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| register_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "keel_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| register_error("http_request_duration_seconds", e))?,

            agent_calls_total: register_counter_vec!(
                "keel_agent_calls_total",
                "Agent function calls by function and outcome",
                &["function", "outcome"]
            )
            .map_err(|e| register_error("agent_calls_total", e))?,

            agent_call_duration_seconds: register_histogram_vec!(
                "keel_agent_call_duration_seconds",
                "Agent function call duration in seconds",
                &["function"],
                AGENT_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| register_error("agent_call_duration_seconds", e))?,

            chat_rounds: register_histogram!(
                "keel_chat_rounds",
                "Tool-call rounds per assistant chat turn",
                CHAT_ROUND_BUCKETS.to_vec()
            )
            .map_err(|e| register_error("chat_rounds", e))?,

            chat_turns_total: register_counter_vec!(
                "keel_chat_turns_total",
                "Assistant chat turns by outcome",
                &["outcome"]
            )
            .map_err(|e| register_error("chat_turns_total", e))?,
        })
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    pub fn record_agent_call(&self, function: &str, outcome: &str, duration_secs: f64) {
        self.agent_calls_total
            .with_label_values(&[function, outcome])
            .inc();
        self.agent_call_duration_seconds
            .with_label_values(&[function])
            .observe(duration_secs);
    }

    pub fn record_chat_turn(&self, rounds: usize, outcome: &str) {
        self.chat_rounds.observe(rounds as f64);
        self.chat_turns_total.with_label_values(&[outcome]).inc();
    }
}

/// Handler for GET /metrics.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    // Touch the lazy so keel_* families appear even before the first request.
    let _ = metrics();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
