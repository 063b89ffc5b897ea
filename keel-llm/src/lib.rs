//! Keel LLM - Chat Provider Layer
//!
//! Provider-agnostic chat types and the [`ChatProvider`] trait used by the
//! assistant loop. Concrete providers live under [`providers`] and are
//! registered explicitly through [`ProviderRegistry`].

pub mod providers;

pub use providers::{OpenAiChatProvider, OpenAiClient};

use async_trait::async_trait;
use keel_core::{KeelError, KeelResult, LlmError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

// ============================================================================
// CHAT TYPES
// ============================================================================

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ToolCall {
    /// Provider-assigned id, echoed back in the tool result message.
    pub id: String,
    pub name: String,
    /// Raw JSON arguments exactly as the model produced them.
    pub arguments: String,
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChatMessage {
    pub role: ChatRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Set on `tool` messages: the call this result answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(ChatRole::Assistant, content)
    }

    /// Assistant turn that requests tool calls.
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Result of a tool call, fed back to the model.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: JsonValue,
}

/// Input to [`ChatProvider::complete`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Provider response: the assistant's next message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
}

// ============================================================================
// PROVIDER TRAIT
// ============================================================================

/// A chat-completions backend with function calling.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Produce the next assistant message for the conversation.
    async fn complete(&self, request: ChatRequest) -> KeelResult<ChatCompletion>;

    /// Model identifier, e.g. "gpt-4o-mini".
    fn model_id(&self) -> &str;
}

// ============================================================================
// PROVIDER REGISTRY
// ============================================================================

/// Registry of configured providers. Nothing is registered by default.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    chat: Option<Arc<dyn ChatProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the chat provider, replacing any previous one.
    pub fn register_chat(&mut self, provider: Box<dyn ChatProvider>) {
        self.chat = Some(Arc::from(provider));
    }

    /// The registered chat provider, or `ProviderNotConfigured`.
    pub fn chat(&self) -> KeelResult<Arc<dyn ChatProvider>> {
        self.chat
            .clone()
            .ok_or(KeelError::Llm(LlmError::ProviderNotConfigured))
    }

    pub fn has_chat(&self) -> bool {
        self.chat.is_some()
    }

    pub fn clear_chat(&mut self) {
        self.chat = None;
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("chat", &self.chat.as_ref().map(|p| p.model_id().to_string()))
            .finish()
    }
}
