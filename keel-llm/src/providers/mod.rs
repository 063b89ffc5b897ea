//! Chat provider implementations.

pub mod openai;

pub use openai::{OpenAiChatProvider, OpenAiClient};

use keel_core::{KeelError, LlmError};

pub(crate) fn request_failed(provider: &str, status: u16, message: impl Into<String>) -> KeelError {
    KeelError::Llm(LlmError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    })
}

pub(crate) fn rate_limited(provider: &str, retry_after_ms: i64) -> KeelError {
    KeelError::Llm(LlmError::RateLimited {
        provider: provider.to_string(),
        retry_after_ms,
    })
}

pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> KeelError {
    KeelError::Llm(LlmError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    })
}

pub(crate) fn transport(provider: &str, reason: impl Into<String>) -> KeelError {
    KeelError::Llm(LlmError::Transport {
        provider: provider.to_string(),
        reason: reason.into(),
    })
}
