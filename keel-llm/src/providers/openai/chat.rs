//! OpenAI chat provider implementation

use super::client::OpenAiClient;
use super::types::{
    CompletionRequest, CompletionResponse, WireFunction, WireFunctionCall, WireMessage, WireTool,
    WireToolCall,
};
use crate::providers::invalid_response;
use crate::{
    ChatCompletion, ChatMessage, ChatProvider, ChatRequest, ChatRole, TokenUsage, ToolCall,
    ToolDefinition,
};
use async_trait::async_trait;
use keel_core::KeelResult;

/// Chat-completions provider with `tools` support.
pub struct OpenAiChatProvider {
    client: OpenAiClient,
    model: String,
}

impl OpenAiChatProvider {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    fn build_request(&self, request: ChatRequest) -> CompletionRequest {
        let tools: Vec<WireTool> = request.tools.into_iter().map(to_wire_tool).collect();
        CompletionRequest {
            model: self.model.clone(),
            messages: request.messages.iter().map(to_wire_message).collect(),
            tool_choice: (!tools.is_empty()).then(|| "auto".to_string()),
            tools,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

fn role_name(role: ChatRole) -> &'static str {
    match role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
        ChatRole::Tool => "tool",
    }
}

fn parse_role(role: &str) -> Option<ChatRole> {
    match role {
        "system" => Some(ChatRole::System),
        "user" => Some(ChatRole::User),
        "assistant" => Some(ChatRole::Assistant),
        "tool" => Some(ChatRole::Tool),
        _ => None,
    }
}

pub(crate) fn to_wire_message(message: &ChatMessage) -> WireMessage {
    let tool_calls = (!message.tool_calls.is_empty()).then(|| {
        message
            .tool_calls
            .iter()
            .map(|call| WireToolCall {
                id: call.id.clone(),
                kind: "function".to_string(),
                function: WireFunctionCall {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                },
            })
            .collect()
    });
    WireMessage {
        role: role_name(message.role).to_string(),
        content: message.content.clone(),
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
    }
}

fn to_wire_tool(tool: ToolDefinition) -> WireTool {
    WireTool {
        kind: "function",
        function: WireFunction {
            name: tool.name,
            description: tool.description,
            parameters: tool.parameters,
        },
    }
}

pub(crate) fn from_response(response: CompletionResponse) -> KeelResult<ChatCompletion> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| invalid_response("openai", "No choices in response"))?;

    let role = parse_role(&choice.message.role).ok_or_else(|| {
        invalid_response("openai", format!("Unknown role '{}'", choice.message.role))
    })?;
    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        })
        .collect();

    Ok(ChatCompletion {
        message: ChatMessage {
            role,
            content: choice.message.content,
            tool_calls,
            tool_call_id: None,
        },
        finish_reason: choice.finish_reason,
        usage: response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
    })
}

#[async_trait]
impl ChatProvider for OpenAiChatProvider {
    async fn complete(&self, request: ChatRequest) -> KeelResult<ChatCompletion> {
        let body = self.build_request(request);
        tracing::debug!(
            model = %self.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "Sending chat completion request"
        );
        let response: CompletionResponse = self.client.request("chat/completions", &body).await?;
        from_response(response)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for OpenAiChatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatProvider")
            .field("model", &self.model)
            .field("client", &self.client)
            .finish()
    }
}
