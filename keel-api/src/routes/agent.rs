//! Assistant REST API Routes
//!
//! - `GET /agent/tools`: the catalog the assistant may use, in OpenAI format
//! - `POST /agent/call`: run one function call directly
//! - `POST /agent/chat`: run one chat turn through the configured provider

use axum::{extract::State, routing::{get, post}, Json, Router};
use keel_llm::ChatMessage;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{
    agent::{AccessLevel, AgentCallRecord, AssistantReply, AssistantRuntime},
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    state::AppState,
};

// ============================================================================
// TYPES
// ============================================================================

/// Tool catalog filtered by the configured access policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentToolsResponse {
    pub access: AccessLevel,
    /// `{"type":"function","function":{name,description,parameters}}` entries.
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub tools: Vec<JsonValue>,
}

/// One function call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentCallRequest {
    pub name: String,
    /// An object, or the raw JSON string a model produced.
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub arguments: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentCallResponse {
    pub record: AgentCallRecord,
    /// `{"ok":true,"data":..}` or `{"ok":false,"error":{code,message,violations?}}`.
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub result: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentChatRequest {
    /// Conversation so far; the last user message is answered.
    pub messages: Vec<ChatMessage>,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /api/v1/agent/tools - List callable functions
#[utoipa::path(
    get,
    path = "/api/v1/agent/tools",
    tag = "Assistant",
    responses(
        (status = 200, description = "Tools allowed by the access policy", body = AgentToolsResponse),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn list_tools(
    State(assistant): State<AssistantRuntime>,
    AuthExtractor(_auth): AuthExtractor,
) -> Json<AgentToolsResponse> {
    let dispatcher = assistant.dispatcher();
    Json(AgentToolsResponse {
        access: dispatcher.access(),
        tools: dispatcher.catalog().openai_tools(dispatcher.access()),
    })
}

/// POST /api/v1/agent/call - Run one function call
///
/// Agent-level failures (unknown function, bad arguments, missing
/// confirmation) are part of a 200 response, exactly as the model sees them.
#[utoipa::path(
    post,
    path = "/api/v1/agent/call",
    tag = "Assistant",
    request_body = AgentCallRequest,
    responses(
        (status = 200, description = "Call record and rendered result", body = AgentCallResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn call_function(
    State(assistant): State<AssistantRuntime>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<AgentCallRequest>,
) -> Json<AgentCallResponse> {
    let outcome = assistant
        .dispatcher()
        .call(auth.tenant_id, &req.name, &req.arguments)
        .await;
    Json(AgentCallResponse {
        result: outcome.render(),
        record: outcome.record,
    })
}

/// POST /api/v1/agent/chat - Run one assistant turn
#[utoipa::path(
    post,
    path = "/api/v1/agent/chat",
    tag = "Assistant",
    request_body = AgentChatRequest,
    responses(
        (status = 200, description = "Assistant reply", body = AssistantReply),
        (status = 400, description = "No user message", body = ApiError),
        (status = 429, description = "Provider rate limit", body = ApiError),
        (status = 502, description = "Provider failure", body = ApiError),
        (status = 503, description = "No chat provider configured", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn chat(
    State(assistant): State<AssistantRuntime>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<AgentChatRequest>,
) -> ApiResult<Json<AssistantReply>> {
    if !assistant.is_available() {
        return Err(ApiError::service_unavailable(
            "No chat provider is configured; set KEEL_OPENAI_API_KEY",
        ));
    }
    Ok(Json(assistant.run(auth.tenant_id, req.messages).await?))
}

/// Create the assistant router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/tools", get(list_tools))
        .route("/call", post(call_function))
        .route("/chat", post(chat))
}
