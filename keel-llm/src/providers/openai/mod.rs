//! OpenAI chat-completions provider with function calling.

pub mod chat;
pub mod client;
pub mod types;

pub use chat::OpenAiChatProvider;
pub use client::OpenAiClient;
