//! Keel API - REST and AI Assistant Layer
//!
//! Exposes the product hierarchy (products, interfaces, features,
//! requirements, releases), roadmaps and documentation pages over an Axum
//! REST API, and lets a chat model operate on the same data through
//! validated function calls.
//!
//! Storage is pluggable: an in-memory store for development and tests, or
//! PostgreSQL through a deadpool connection pool.

#[macro_use]
pub mod macros;

pub mod agent;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use agent::{
    AccessLevel, AgentCallOutcome, AgentCallRecord, AgentDispatcher, AgentError, AssistantReply,
    AssistantRuntime, FunctionTool, ToolCatalog,
};
pub use auth::{
    authenticate, generate_jwt_token, validate_api_key, validate_jwt_token, AuthConfig,
    AuthContext, AuthMethod, Claims,
};
pub use config::{AgentConfig, ApiConfig, LlmConfig, StorageBackend};
pub use db::{DbConfig, PgRecordStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{auth_middleware, AuthExtractor, AuthMiddlewareState};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use services::Services;
pub use state::AppState;
pub use types::*;
