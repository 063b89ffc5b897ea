#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use keel_api::{
    create_api_router, AccessLevel, AgentConfig, ApiConfig, AppState, AuthConfig,
};
use keel_core::TenantId;
use keel_llm::ProviderRegistry;
use keel_storage::{InMemoryStore, RecordStore};
use serde_json::Value as JsonValue;
use tower::ServiceExt;

pub const TEST_API_KEY: &str = "test_key_keel_0001";

pub fn test_auth_config() -> AuthConfig {
    let mut config = AuthConfig::default();
    config.add_api_key(TEST_API_KEY.to_string());
    config
}

/// Router over a fresh in-memory store.
pub fn test_app(providers: ProviderRegistry, access: AccessLevel) -> Router {
    let store: Arc<dyn RecordStore> = Arc::new(InMemoryStore::new());
    test_app_with_store(store, providers, access)
}

pub fn test_app_with_store(
    store: Arc<dyn RecordStore>,
    providers: ProviderRegistry,
    access: AccessLevel,
) -> Router {
    let agent_config = AgentConfig {
        access,
        ..AgentConfig::default()
    };
    let state = AppState::new(store, providers, agent_config).expect("app state");
    create_api_router(state, &ApiConfig::default(), test_auth_config()).expect("router")
}

/// Send an authenticated request as `tenant` and decode the JSON body.
pub async fn send(
    app: &Router,
    tenant: TenantId,
    method: Method,
    uri: &str,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-api-key", TEST_API_KEY)
        .header("x-tenant-id", tenant.to_string());
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");
    read(app, request).await
}

pub async fn read(app: &Router, request: Request<Body>) -> (StatusCode, JsonValue) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
    };
    (status, json)
}

/// `body[field]` as a string, for pulling ids out of responses.
pub fn id_of(body: &JsonValue, field: &str) -> String {
    body[field]
        .as_str()
        .unwrap_or_else(|| panic!("missing {} in {}", field, body))
        .to_string()
}
