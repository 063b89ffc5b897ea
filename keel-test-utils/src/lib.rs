//! Keel Test Utilities
//!
//! Shared test infrastructure for the Keel workspace:
//! - A scripted chat provider for driving the assistant loop
//! - Proptest generators for entities and enums
//! - Fixtures for a small product tree and page tree
//! - Assertions over `KeelResult` error variants

// Re-export the in-memory store from its source crate
pub use keel_storage::InMemoryStore;

// Re-export core types for convenience
pub use keel_core::{
    Feature, FeatureId, FeatureStatus, Interface, InterfaceId, KeelError, KeelResult, LlmError,
    Page, PageId, PageType, Priority, Product, ProductId, RecordKind, Release, ReleaseId,
    ReleaseStatus, Requirement, RequirementId, RequirementStatus, Roadmap, RoadmapId,
    StorageError, TenantId, Timestamp, TreeError, ValidationError,
};
pub use keel_llm::{
    ChatCompletion, ChatMessage, ChatProvider, ChatRequest, TokenUsage, ToolCall,
};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value as JsonValue};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

// ============================================================================
// MOCK PROVIDERS
// ============================================================================

/// Chat provider that replays a fixed script of completions.
///
/// Every request is recorded so tests can inspect what the assistant sent.
/// Once the script runs out, `complete` fails with `InvalidResponse`.
#[derive(Debug, Clone, Default)]
pub struct MockChatProvider {
    script: Arc<Mutex<VecDeque<ChatCompletion>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl MockChatProvider {
    pub fn new(script: impl IntoIterator<Item = ChatCompletion>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Append another completion to the script.
    pub fn push(&self, completion: ChatCompletion) {
        lock(&self.script).push_back(completion);
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }

    /// A plain-text answer.
    pub fn text(content: impl Into<String>) -> ChatCompletion {
        ChatCompletion {
            message: ChatMessage::assistant(content),
            finish_reason: Some("stop".to_string()),
            usage: Some(TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        }
    }

    /// A single function call with JSON `arguments`.
    pub fn call(name: &str, arguments: JsonValue) -> ChatCompletion {
        Self::calls(vec![(name, arguments)])
    }

    /// Several function calls in one assistant message.
    pub fn calls(calls: Vec<(&str, JsonValue)>) -> ChatCompletion {
        let tool_calls = calls
            .into_iter()
            .enumerate()
            .map(|(i, (name, arguments))| ToolCall {
                id: format!("call_{}_{}", name, i),
                name: name.to_string(),
                arguments: arguments.to_string(),
            })
            .collect();
        ChatCompletion {
            message: ChatMessage::assistant_tool_calls(None, tool_calls),
            finish_reason: Some("tool_calls".to_string()),
            usage: None,
        }
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn complete(&self, request: ChatRequest) -> KeelResult<ChatCompletion> {
        lock(&self.requests).push(request);
        lock(&self.script).pop_front().ok_or_else(|| {
            KeelError::Llm(LlmError::InvalidResponse {
                provider: "mock".to_string(),
                reason: "script exhausted".to_string(),
            })
        })
    }

    fn model_id(&self) -> &str {
        "mock-chat"
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Keel entity types.

    use super::*;
    use proptest::prelude::*;

    // === Identity Type Generators ===

    /// Generate a random UUID (for generic ID generation).
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    pub fn arb_tenant_id() -> impl Strategy<Value = TenantId> {
        arb_uuid().prop_map(TenantId::new)
    }

    pub fn arb_product_id() -> impl Strategy<Value = ProductId> {
        arb_uuid().prop_map(ProductId::new)
    }

    pub fn arb_page_id() -> impl Strategy<Value = PageId> {
        arb_uuid().prop_map(PageId::new)
    }

    /// Generate a timestamp within a reasonable range (2020-2030).
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64)
            .prop_map(|secs| chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now))
    }

    // === Text Generators ===

    /// Names that pass validation once trimmed.
    pub fn arb_name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 _-]{0,40}"
    }

    pub fn arb_description() -> impl Strategy<Value = String> {
        "[A-Za-z0-9 .,]{0,200}"
    }

    // === Enum Generators ===

    pub fn arb_priority() -> impl Strategy<Value = Priority> {
        prop::sample::select(Priority::ALL)
    }

    pub fn arb_feature_status() -> impl Strategy<Value = FeatureStatus> {
        prop::sample::select(FeatureStatus::ALL)
    }

    pub fn arb_requirement_status() -> impl Strategy<Value = RequirementStatus> {
        prop::sample::select(RequirementStatus::ALL)
    }

    pub fn arb_release_status() -> impl Strategy<Value = ReleaseStatus> {
        prop::sample::select(ReleaseStatus::ALL)
    }

    pub fn arb_page_type() -> impl Strategy<Value = PageType> {
        prop::sample::select(PageType::ALL)
    }

    /// Page types allowed at the top of the tree.
    pub fn arb_root_page_type() -> impl Strategy<Value = PageType> {
        arb_page_type().prop_filter("notes cannot be roots", |t| t.can_be_root())
    }

    // === Entity Generators ===

    /// Generate a Product owned by `tenant_id`.
    pub fn arb_product(tenant_id: TenantId) -> impl Strategy<Value = Product> {
        (arb_product_id(), arb_name(), arb_description(), arb_timestamp()).prop_map(
            move |(product_id, name, description, created_at)| Product {
                product_id,
                tenant_id,
                name,
                description,
                created_at,
                updated_at: created_at,
            },
        )
    }

    /// Generate a Feature under `interface_id`.
    pub fn arb_feature(tenant_id: TenantId, interface_id: InterfaceId) -> impl Strategy<Value = Feature> {
        (
            arb_uuid().prop_map(FeatureId::new),
            arb_name(),
            arb_description(),
            arb_priority(),
            arb_feature_status(),
            arb_timestamp(),
        )
            .prop_map(
                move |(feature_id, name, description, priority, status, created_at)| Feature {
                    feature_id,
                    tenant_id,
                    interface_id,
                    name,
                    description,
                    priority,
                    status,
                    is_saved: false,
                    saved_at: None,
                    created_at,
                    updated_at: created_at,
                },
            )
    }

    /// Generate a top-level Page.
    pub fn arb_root_page(tenant_id: TenantId) -> impl Strategy<Value = Page> {
        (arb_page_id(), arb_root_page_type(), arb_name(), arb_timestamp()).prop_map(
            move |(page_id, page_type, title, created_at)| Page {
                page_id,
                tenant_id,
                parent_id: None,
                page_type,
                title,
                properties: Map::new(),
                blocks: Vec::new(),
                position: 0,
                created_at,
                updated_at: created_at,
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built entities for common scenarios.

    use super::*;

    pub fn tenant() -> TenantId {
        TenantId::now_v7()
    }

    pub fn product(tenant_id: TenantId) -> Product {
        let now = Utc::now();
        Product {
            product_id: ProductId::now_v7(),
            tenant_id,
            name: "Atlas".to_string(),
            description: "Internal planning tool".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn interface(product: &Product) -> Interface {
        let now = Utc::now();
        Interface {
            interface_id: InterfaceId::now_v7(),
            tenant_id: product.tenant_id,
            product_id: product.product_id,
            name: "Web".to_string(),
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn feature(interface: &Interface) -> Feature {
        let now = Utc::now();
        Feature {
            feature_id: FeatureId::now_v7(),
            tenant_id: interface.tenant_id,
            interface_id: interface.interface_id,
            name: "Single sign-on".to_string(),
            description: String::new(),
            priority: Priority::High,
            status: FeatureStatus::Planned,
            is_saved: false,
            saved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn requirement(feature: &Feature) -> Requirement {
        let now = Utc::now();
        Requirement {
            requirement_id: RequirementId::now_v7(),
            tenant_id: feature.tenant_id,
            feature_id: feature.feature_id,
            name: "SAML login".to_string(),
            description: String::new(),
            owner: Some("pm@example.com".to_string()),
            priority: Priority::Med,
            status: RequirementStatus::Draft,
            cuj: None,
            acceptance_criteria: vec!["User can log in with Okta".to_string()],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn roadmap(tenant_id: TenantId, is_default: bool) -> Roadmap {
        let now = Utc::now();
        Roadmap {
            roadmap_id: RoadmapId::now_v7(),
            tenant_id,
            name: "2026".to_string(),
            description: String::new(),
            is_default,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn release(feature: &Feature, roadmap_id: Option<RoadmapId>) -> Release {
        let now = Utc::now();
        Release {
            release_id: ReleaseId::now_v7(),
            tenant_id: feature.tenant_id,
            feature_id: feature.feature_id,
            roadmap_id,
            name: "v1".to_string(),
            description: String::new(),
            target_date: None,
            priority: Priority::Med,
            status: ReleaseStatus::Planned,
            created_at: now,
            updated_at: now,
        }
    }

    /// A page of `page_type` under `parent`, at `position`.
    pub fn page(
        tenant_id: TenantId,
        page_type: PageType,
        parent_id: Option<PageId>,
        position: u32,
    ) -> Page {
        let now = Utc::now();
        Page {
            page_id: PageId::now_v7(),
            tenant_id,
            parent_id,
            page_type,
            title: format!("{} page", page_type),
            properties: Map::new(),
            blocks: Vec::new(),
            position,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over Keel error variants.

    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &KeelResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    #[track_caller]
    pub fn assert_err<T: std::fmt::Debug>(result: &KeelResult<T>) {
        assert!(result.is_err(), "Expected Err, got Ok: {:?}", result);
    }

    /// Assert that a KeelResult is a NotFound storage error for `kind`.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &KeelResult<T>, kind: RecordKind) {
        match result {
            Err(KeelError::Storage(StorageError::NotFound { kind: k, .. })) => {
                assert_eq!(*k, kind, "Wrong kind in NotFound error");
            }
            other => panic!("Expected NotFound error for {:?}, got: {:?}", kind, other),
        }
    }

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &KeelResult<T>) {
        match result {
            Err(KeelError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_tree_error<T: std::fmt::Debug>(result: &KeelResult<T>) {
        match result {
            Err(KeelError::Tree(_)) => {}
            other => panic!("Expected Tree error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_provider_not_configured<T: std::fmt::Debug>(result: &KeelResult<T>) {
        match result {
            Err(KeelError::Llm(LlmError::ProviderNotConfigured)) => {}
            other => panic!("Expected ProviderNotConfigured error, got: {:?}", other),
        }
    }

    /// Assert that every entity belongs to `tenant_id`.
    #[track_caller]
    pub fn assert_same_tenant(tenant_id: TenantId, tenants: impl IntoIterator<Item = TenantId>) {
        for t in tenants {
            assert_eq!(t, tenant_id, "Row leaked across tenants");
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
