//! Tracing Subscriber Initialization
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and either
//! JSON (production) or human-readable output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "keel_api=debug,tower_http=debug,info";

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "pretty" || v == "text" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    pub service_version: String,
    /// Environment (production, staging, development)
    pub environment: String,
    /// `KEEL_LOG_FORMAT`: "json" (default) or "pretty"
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl TelemetryConfig {
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            service_name: get("KEEL_SERVICE_NAME").unwrap_or_else(|| "keel-api".to_string()),
            service_version: get("KEEL_SERVICE_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            environment: get("KEEL_ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            log_format: LogFormat::parse(get("KEEL_LOG_FORMAT").as_deref()),
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once at startup, before anything logs. A second call fails because
/// a global subscriber is already installed.
pub fn init_tracer(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    result.map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = config.service_name,
        service_version = config.service_version,
        environment = config.environment,
        log_format = ?config.log_format,
        "Telemetry initialized"
    );
    Ok(())
}
