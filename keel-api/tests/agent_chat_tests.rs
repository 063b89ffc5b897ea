//! Assistant endpoints driven by a scripted chat provider.

use axum::http::{Method, StatusCode};
use keel_api::AccessLevel;
use keel_core::TenantId;
use keel_llm::{ChatRole, ProviderRegistry};
use keel_test_utils::MockChatProvider;
use serde_json::{json, Value as JsonValue};

#[path = "support/app.rs"]
mod app_support;
use app_support::{send, test_app};

fn scripted(provider: &MockChatProvider) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register_chat(Box::new(provider.clone()));
    registry
}

fn user(text: &str) -> JsonValue {
    json!({ "messages": [{ "role": "user", "content": text }] })
}

/// Parsed content of every tool message in a request.
fn tool_results(request: &keel_llm::ChatRequest) -> Vec<JsonValue> {
    request
        .messages
        .iter()
        .filter(|m| m.role == ChatRole::Tool)
        .filter_map(|m| m.content.as_deref())
        .filter_map(|c| serde_json::from_str(c).ok())
        .collect()
}

#[tokio::test]
async fn chat_turn_runs_tools_and_answers() {
    let provider = MockChatProvider::new([
        MockChatProvider::call("create_product", json!({"name": "Atlas"})),
        MockChatProvider::text("Created the Atlas product."),
    ]);
    let app = test_app(scripted(&provider), AccessLevel::Write);
    let tenant = TenantId::now_v7();

    let (status, reply) = send(
        &app,
        tenant,
        Method::POST,
        "/api/v1/agent/chat",
        Some(user("Make a product called Atlas")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["message"]["content"], "Created the Atlas product.");
    assert_eq!(reply["rounds"], 1);
    assert_eq!(reply["truncated"], false);
    assert_eq!(reply["tool_calls"][0]["name"], "create_product");
    assert_eq!(reply["tool_calls"][0]["ok"], true);

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].messages[0].role, ChatRole::System);
    let results = tool_results(&requests[1]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["ok"], true);
    assert_eq!(results[0]["data"]["name"], "Atlas");

    let (_, products) = send(&app, tenant, Method::GET, "/api/v1/products", None).await;
    assert_eq!(products["total"], 1);
}

#[tokio::test]
async fn failed_calls_are_reported_back_to_the_model() {
    let provider = MockChatProvider::new([
        MockChatProvider::calls(vec![
            ("create_feature", json!({"priority": "urgent"})),
            ("delete_product", json!({"product_id": TenantId::now_v7(), "confirm": true})),
            ("launch_rockets", json!({})),
        ]),
        MockChatProvider::text("I could not do any of that."),
    ]);
    let app = test_app(scripted(&provider), AccessLevel::Write);

    let (status, reply) = send(
        &app,
        TenantId::now_v7(),
        Method::POST,
        "/api/v1/agent/chat",
        Some(user("Do three things")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let codes: Vec<&str> = reply["tool_calls"]
        .as_array()
        .map(|calls| calls.iter().filter_map(|c| c["error_code"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(codes, vec!["invalid_arguments", "access_denied", "unknown_function"]);

    let results = tool_results(&provider.requests()[1]);
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r["ok"] == false));
    let violations = results[0]["error"]["violations"]
        .as_array()
        .map(Vec::len)
        .unwrap_or(0);
    assert!(violations >= 2, "expected every violation, got {}", results[0]);
}

#[tokio::test]
async fn tools_offered_follow_the_access_policy() {
    let provider = MockChatProvider::new([MockChatProvider::text("Hello!")]);
    let app = test_app(scripted(&provider), AccessLevel::Read);

    let (status, reply) = send(&app, TenantId::now_v7(), Method::POST, "/api/v1/agent/chat", Some(user("hi"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["rounds"], 0);

    let offered = &provider.requests()[0].tools;
    assert!(!offered.is_empty());
    assert!(offered
        .iter()
        .all(|t| t.name.starts_with("list_") || t.name.starts_with("get_")));

    let (status, tools) = send(&app, TenantId::now_v7(), Method::GET, "/api/v1/agent/tools", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tools["access"], "read");
    assert_eq!(tools["tools"].as_array().map(Vec::len), Some(offered.len()));
}

#[tokio::test]
async fn chat_without_provider_is_unavailable() {
    let app = test_app(ProviderRegistry::new(), AccessLevel::Write);
    let (status, body) = send(&app, TenantId::now_v7(), Method::POST, "/api/v1/agent/chat", Some(user("hi"))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn chat_needs_a_user_message() {
    let provider = MockChatProvider::default();
    let app = test_app(scripted(&provider), AccessLevel::Write);
    let (status, _) = send(
        &app,
        TenantId::now_v7(),
        Method::POST,
        "/api/v1/agent/chat",
        Some(json!({ "messages": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn direct_calls_need_confirmation_for_deletes() {
    let app = test_app(ProviderRegistry::new(), AccessLevel::Destructive);
    let tenant = TenantId::now_v7();

    let (status, created) = send(
        &app,
        tenant,
        Method::POST,
        "/api/v1/agent/call",
        Some(json!({"name": "create_page", "arguments": {"page_type": "document", "title": "Launch plan"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["result"]["ok"], true);
    let page_id = created["result"]["data"]["page_id"].clone();

    let (status, refused) = send(
        &app,
        tenant,
        Method::POST,
        "/api/v1/agent/call",
        Some(json!({"name": "delete_page", "arguments": {"page_id": page_id, "confirm": false}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refused["record"]["ok"], false);
    assert_eq!(refused["result"]["error"]["code"], "confirmation_required");

    let (_, deleted) = send(
        &app,
        tenant,
        Method::POST,
        "/api/v1/agent/call",
        Some(json!({"name": "delete_page", "arguments": {"page_id": page_id, "confirm": true}})),
    )
    .await;
    assert_eq!(deleted["result"]["ok"], true);
    assert_eq!(deleted["result"]["data"]["deleted"], 1);
}
