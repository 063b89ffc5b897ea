//! API error model.
//!
//! Every failure leaves a handler as `{"code", "message", "details"?}` with
//! the status implied by its [`ErrorCode`]. Core, storage, LLM and Postgres
//! errors convert in here so services can use `?` throughout.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use keel_core::{KeelError, LlmError, StorageError, TreeError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Machine-readable error category. Serialized as `SCREAMING_SNAKE_CASE`;
/// clients match on this, never on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authentication Errors (401, 403)
    // ========================================================================
    /// No API key or bearer token, or an unknown key
    Unauthorized,

    /// Credentials are valid but not for this tenant
    Forbidden,

    /// Bearer token failed to decode or verify
    InvalidToken,

    /// Bearer token `exp` is in the past
    TokenExpired,

    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// A field value broke an entity rule (name length, status value)
    ValidationFailed,

    /// Body or query could not be used as given
    InvalidInput,

    /// A required field was absent or blank
    MissingField,

    /// A field did not parse (ids, dates)
    InvalidFormat,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// No row with that id for the caller's tenant
    EntityNotFound,

    // ========================================================================
    // Conflict Errors (409)
    // ========================================================================
    /// Duplicate id on insert
    EntityAlreadyExists,

    /// Page move or insert would break the tree rules
    TreeConflict,

    /// The row changed in a way that makes the request invalid
    StateConflict,

    // ========================================================================
    // Server Errors (500, 502, 503)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Postgres returned an error
    DatabaseError,

    /// The LLM provider returned an error
    UpstreamError,

    /// A dependency is down or not configured
    ServiceUnavailable,

    /// Every pooled connection is busy
    ConnectionPoolExhausted,

    /// The request exceeded the server timeout
    Timeout,

    /// The LLM provider rate-limited us
    TooManyRequests,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized | ErrorCode::InvalidToken | ErrorCode::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }

            ErrorCode::Forbidden => StatusCode::FORBIDDEN,

            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingField
            | ErrorCode::InvalidFormat => StatusCode::BAD_REQUEST,

            ErrorCode::EntityNotFound => StatusCode::NOT_FOUND,

            ErrorCode::EntityAlreadyExists | ErrorCode::TreeConflict | ErrorCode::StateConflict => {
                StatusCode::CONFLICT
            }

            ErrorCode::ServiceUnavailable | ErrorCode::ConnectionPoolExhausted => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,

            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,

            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,

            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Missing or unknown credentials",
            ErrorCode::Forbidden => "Not allowed for this tenant",
            ErrorCode::InvalidToken => "Bearer token rejected",
            ErrorCode::TokenExpired => "Bearer token expired",

            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::InvalidInput => "Invalid request",
            ErrorCode::MissingField => "Missing required field",
            ErrorCode::InvalidFormat => "Malformed field",

            ErrorCode::EntityNotFound => "Not found",

            ErrorCode::EntityAlreadyExists => "Already exists",
            ErrorCode::TreeConflict => "Operation violates page tree rules",
            ErrorCode::StateConflict => "Conflicting update",

            ErrorCode::InternalError => "Internal error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::UpstreamError => "LLM provider request failed",
            ErrorCode::ServiceUnavailable => "Temporarily unavailable",
            ErrorCode::ConnectionPoolExhausted => "Database busy",
            ErrorCode::Timeout => "Request timed out",
            ErrorCode::TooManyRequests => "Rate limited upstream",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// JSON error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    /// Field errors or schema violations, when there are any.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Error carrying the code's default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Constructors
    // ========================================================================

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidToken, message)
    }

    pub fn token_expired() -> Self {
        Self::from_code(ErrorCode::TokenExpired)
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn invalid_format(field: &str, expected: &str) -> Self {
        Self::new(
            ErrorCode::InvalidFormat,
            format!("Field '{}' has invalid format, expected {}", field, expected),
        )
    }

    pub fn entity_not_found(entity_type: &str, id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityNotFound,
            format!("{} with id {} not found", entity_type, id),
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EntityNotFound, message)
    }

    pub fn entity_already_exists(entity_type: &str, id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityAlreadyExists,
            format!("{} with id {} already exists", entity_type, id),
        )
    }

    pub fn tree_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TreeConflict, message)
    }

    pub fn state_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StateConflict, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn upstream_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn connection_pool_exhausted() -> Self {
        Self::from_code(ErrorCode::ConnectionPoolExhausted)
    }

    pub fn timeout(operation: &str) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Operation '{}' timed out", operation),
        )
    }

    pub fn too_many_requests(retry_after_ms: Option<i64>) -> Self {
        let message = match retry_after_ms {
            Some(ms) if ms > 0 => format!("Rate limit exceeded. Retry after {} ms", ms),
            _ => "Rate limit exceeded".to_string(),
        };
        Self::new(ErrorCode::TooManyRequests, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<KeelError> for ApiError {
    fn from(err: KeelError) -> Self {
        match err {
            KeelError::Storage(e) => e.into(),
            KeelError::Validation(e) => e.into(),
            KeelError::Tree(e) => e.into(),
            KeelError::Llm(e) => e.into(),
            KeelError::Config(e) => {
                tracing::error!(error = %e, "Configuration error surfaced in request");
                ApiError::internal_error("Server misconfigured")
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { kind, id } => ApiError::entity_not_found(kind.label(), id),
            StorageError::AlreadyExists { kind, id } => {
                ApiError::entity_already_exists(kind.label(), id)
            }
            other => {
                tracing::error!(error = %other, "Storage error");
                ApiError::database_error("Database operation failed")
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        match &err {
            ValidationError::RequiredFieldMissing { field } => ApiError::missing_field(field),
            // Cross-tenant references are reported as missing rows.
            ValidationError::TenantMismatch { kind, id } => {
                ApiError::entity_not_found(kind.label(), id)
            }
            ValidationError::InvalidValue { field, .. } | ValidationError::TooLong { field, .. } => {
                ApiError::validation_failed(err.to_string())
                    .with_details(serde_json::json!({ "field": field }))
            }
        }
    }
}

impl From<TreeError> for ApiError {
    fn from(err: TreeError) -> Self {
        ApiError::tree_conflict(err.to_string())
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::ProviderNotConfigured => {
                ApiError::service_unavailable("No chat provider is configured")
            }
            LlmError::RateLimited { retry_after_ms, .. } => {
                ApiError::too_many_requests(Some(retry_after_ms))
            }
            other => {
                tracing::warn!(error = %other, "LLM provider error");
                ApiError::upstream_error(other.to_string())
            }
        }
    }
}

impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        ApiError::database_error("Database operation failed")
    }
}

impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!("Connection pool error: {:?}", err);
        match err {
            deadpool_postgres::PoolError::Timeout(_) => ApiError::connection_pool_exhausted(),
            deadpool_postgres::PoolError::Closed => {
                ApiError::service_unavailable("Database connection pool is closed")
            }
            _ => ApiError::database_error("Failed to acquire database connection"),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

impl From<uuid::Error> for ApiError {
    fn from(err: uuid::Error) -> Self {
        ApiError::invalid_format("id", &format!("valid UUID: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::{RecordKind, TreeError};
    use uuid::Uuid;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::ValidationFailed.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::EntityNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::TreeConflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::UpstreamError.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(ErrorCode::InternalError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorCode::ServiceUnavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_keel_error_mapping() {
        let id = Uuid::now_v7();
        let not_found: ApiError = KeelError::from(StorageError::NotFound {
            kind: RecordKind::Feature,
            id,
        })
        .into();
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert!(not_found.message.contains("Feature"));

        let tree: ApiError = KeelError::from(TreeError::Cycle { node: id, new_parent: id }).into();
        assert_eq!(tree.code, ErrorCode::TreeConflict);

        let invalid: ApiError = KeelError::from(ValidationError::TooLong {
            field: "name".to_string(),
            max: 255,
        })
        .into();
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.details, Some(serde_json::json!({"field": "name"})));
    }

    #[test]
    fn test_tenant_mismatch_looks_missing() {
        let err: ApiError = ValidationError::TenantMismatch {
            kind: RecordKind::Product,
            id: Uuid::nil(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::EntityNotFound);
    }

    #[test]
    fn test_llm_error_mapping() {
        let err: ApiError = LlmError::ProviderNotConfigured.into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err: ApiError = LlmError::RateLimited {
            provider: "openai".to_string(),
            retry_after_ms: 500,
        }
        .into();
        assert_eq!(err.code, ErrorCode::TooManyRequests);
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::unauthorized("Invalid token");
        let json = serde_json::to_string(&err)?;

        assert!(json.contains("UNAUTHORIZED"));
        assert!(json.contains("Invalid token"));
        assert!(!json.contains("details"));

        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }
}
