//! AI Assistant Layer
//!
//! Lets a chat model read and change workspace data through function calls.
//! Every call is checked against the access policy, validated against the
//! tool's JSON Schema, deserialized into typed parameters and only then
//! forwarded to the service layer. Failures are rendered back to the model as
//! tool results instead of aborting the conversation.

pub mod chat;
pub mod error;
pub mod operations;
pub mod tools;

pub use chat::{AssistantReply, AssistantRuntime};
pub use error::AgentError;
pub use operations::{AgentCallOutcome, AgentCallRecord, AgentDispatcher};
pub use tools::{FunctionTool, ToolCatalog};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a tool may do. Ordered: `Read < Write < Destructive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Read,
    Write,
    Destructive,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
            AccessLevel::Destructive => "destructive",
        }
    }

    /// Whether a policy of `self` allows a tool that needs `required`.
    pub fn allows(&self, required: AccessLevel) -> bool {
        required <= *self
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" | "read_only" | "readonly" => Ok(AccessLevel::Read),
            "write" => Ok(AccessLevel::Write),
            "destructive" | "all" => Ok(AccessLevel::Destructive),
            other => Err(format!("unknown access level: {}", other)),
        }
    }
}
