//! Agent call errors and their rendering as tool results.

use serde_json::{json, Value as JsonValue};
use thiserror::Error;

use super::AccessLevel;
use crate::error::{ApiError, ErrorCode};

/// Why an agent function call failed. Each variant has a stable snake_case code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("Function {name} needs {required} access; the assistant is limited to {allowed}")]
    AccessDenied {
        name: String,
        required: AccessLevel,
        allowed: AccessLevel,
    },

    #[error("Invalid arguments: {message}")]
    InvalidArguments {
        message: String,
        violations: Vec<String>,
    },

    #[error("{name} permanently deletes data; ask the user, then call it again with \"confirm\": true")]
    ConfirmationRequired { name: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("{message}")]
    Internal { message: String },
}

impl AgentError {
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        let message = message.into();
        AgentError::InvalidArguments {
            violations: vec![message.clone()],
            message,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AgentError::UnknownFunction { .. } => "unknown_function",
            AgentError::AccessDenied { .. } => "access_denied",
            AgentError::InvalidArguments { .. } => "invalid_arguments",
            AgentError::ConfirmationRequired { .. } => "confirmation_required",
            AgentError::NotFound { .. } => "not_found",
            AgentError::Conflict { .. } => "conflict",
            AgentError::Internal { .. } => "internal",
        }
    }

    /// `{"code", "message", "violations"?}`
    pub fn to_json(&self) -> JsonValue {
        let mut body = json!({
            "code": self.code(),
            "message": self.to_string(),
        });
        if let AgentError::InvalidArguments { violations, .. } = self {
            body["violations"] = json!(violations);
        }
        body
    }
}

impl From<ApiError> for AgentError {
    fn from(err: ApiError) -> Self {
        match err.code {
            ErrorCode::EntityNotFound => AgentError::NotFound {
                message: err.message,
            },
            ErrorCode::EntityAlreadyExists | ErrorCode::TreeConflict | ErrorCode::StateConflict => {
                AgentError::Conflict {
                    message: err.message,
                }
            }
            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingField
            | ErrorCode::InvalidFormat => AgentError::invalid_arguments(err.message),
            _ => AgentError::Internal {
                message: err.message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            AgentError::UnknownFunction {
                name: "x".to_string()
            }
            .code(),
            "unknown_function"
        );
        assert_eq!(
            AgentError::ConfirmationRequired {
                name: "delete_page".to_string()
            }
            .code(),
            "confirmation_required"
        );
    }

    #[test]
    fn test_violations_only_on_invalid_arguments() {
        let err = AgentError::InvalidArguments {
            message: "2 violations".to_string(),
            violations: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_json()["violations"], json!(["a", "b"]));

        let err = AgentError::NotFound {
            message: "gone".to_string(),
        };
        assert!(err.to_json().get("violations").is_none());
    }

    #[test]
    fn test_from_api_error() {
        assert_eq!(
            AgentError::from(ApiError::entity_not_found("Page", "p1")).code(),
            "not_found"
        );
        assert_eq!(
            AgentError::from(ApiError::tree_conflict("cycle")).code(),
            "conflict"
        );
        assert_eq!(
            AgentError::from(ApiError::missing_field("name")).code(),
            "invalid_arguments"
        );
        assert_eq!(
            AgentError::from(ApiError::database_error("boom")).code(),
            "internal"
        );
    }
}
