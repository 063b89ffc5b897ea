//! Error types for Keel operations

use crate::RecordKind;
use thiserror::Error;
use uuid::Uuid;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {kind:?} with id {id}")]
    NotFound { kind: RecordKind, id: Uuid },

    #[error("{kind:?} with id {id} already exists")]
    AlreadyExists { kind: RecordKind, id: Uuid },

    #[error("Insert failed for {kind:?}: {reason}")]
    InsertFailed { kind: RecordKind, reason: String },

    #[error("Update failed for {kind:?} with id {id}: {reason}")]
    UpdateFailed {
        kind: RecordKind,
        id: Uuid,
        reason: String,
    },

    #[error("Stored {kind:?} row {id} could not be decoded: {reason}")]
    Corrupt {
        kind: RecordKind,
        id: Uuid,
        reason: String,
    },

    #[error("Backend error: {reason}")]
    Backend { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Field-level validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Field {field} exceeds {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{kind:?} {id} belongs to a different tenant")]
    TenantMismatch { kind: RecordKind, id: Uuid },
}

/// Page-tree structure errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("Moving page {node} under {new_parent} would create a cycle")]
    Cycle { node: Uuid, new_parent: Uuid },

    #[error("A {parent} page cannot contain a {child} page")]
    InvalidNesting { parent: String, child: String },

    #[error("A {page_type} page cannot be a root page")]
    InvalidRoot { page_type: String },

    #[error("Tree depth exceeded {max_depth} levels starting at {node}")]
    DepthExceeded { node: Uuid, max_depth: usize },
}

/// LLM provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("No LLM provider configured")]
    ProviderNotConfigured,

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: i64,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Transport error talking to {provider}: {reason}")]
    Transport { provider: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Keel errors.
#[derive(Debug, Clone, Error)]
pub enum KeelError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Keel operations.
pub type KeelResult<T> = Result<T, KeelError>;

// =============================================================================
// TESTS
// =============================================================================
