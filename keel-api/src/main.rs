//! Keel API Server Entry Point
//!
//! Bootstraps configuration, opens the configured record store, registers
//! the chat provider and starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use keel_api::telemetry::{init_tracer, TelemetryConfig};
use keel_api::{
    create_api_router, AgentConfig, ApiConfig, ApiError, ApiResult, AppState, AuthConfig,
    DbConfig, LlmConfig, PgRecordStore, StorageBackend,
};
use keel_core::ConfigError;
use keel_storage::{InMemoryStore, RecordStore};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracer(&telemetry_config)?;

    let api_config = ApiConfig::from_env().map_err(config_error)?;
    let agent_config = AgentConfig::from_env().map_err(config_error)?;
    let auth_config = AuthConfig::from_env();
    let providers = LlmConfig::from_env().build_registry()?;

    let store = open_store(api_config.storage).await?;
    let state = AppState::new(store, providers, agent_config)?;
    let app: Router = create_api_router(state, &api_config, auth_config)?;

    let addr = resolve_bind_addr(&api_config)?;
    tracing::info!(%addr, storage = ?api_config.storage, "Starting Keel API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

async fn open_store(backend: StorageBackend) -> ApiResult<Arc<dyn RecordStore>> {
    match backend {
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StorageBackend::Postgres => {
            let db_config = DbConfig::from_env();
            let store = PgRecordStore::from_config(&db_config)?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
    }
}

fn resolve_bind_addr(config: &ApiConfig) -> ApiResult<SocketAddr> {
    config.bind_addr.parse::<SocketAddr>().map_err(|e| {
        ApiError::invalid_input(format!("Invalid bind address {}: {}", config.bind_addr, e))
    })
}

fn config_error(err: ConfigError) -> ApiError {
    ApiError::invalid_input(format!("Invalid configuration: {}", err))
}
