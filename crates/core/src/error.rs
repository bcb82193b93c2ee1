//! Error types for the admitline domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator boundary has its own error type so callers can decide
//! which failures degrade gracefully and which must be surfaced.

use thiserror::Error;

/// The top-level error type for all admitline operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Request validation ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // --- Collaborator errors ---
    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    // --- Capacity ---
    #[error("Context overflow: {0}")]
    ContextOverflow(String),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Name of the collaborator that failed, for operator logs.
    pub fn collaborator(&self) -> &'static str {
        match self {
            Error::Generator(_) | Error::ContextOverflow(_) => "generator",
            Error::Retrieval(_) => "retrieval",
            Error::Store(_) => "contact_store",
            Error::Notify(_) => "notification",
            Error::Validation(_) => "request",
            Error::Config { .. } => "config",
            Error::Serialization(_) | Error::Internal(_) => "internal",
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Malformed request input, rejected before any core logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("Message is too long ({length} characters, limit {limit})")]
    MessageTooLong { length: usize, limit: usize },

    #[error("Invalid session id")]
    InvalidSessionId,
}

#[derive(Debug, Clone, Error)]
pub enum GeneratorError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The provider rejected the request because the prompt exceeded
    /// its context window.
    #[error("Provider context window exceeded: {0}")]
    ContextOverflow(String),

    #[error("Generator not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    InvalidResponse(String),
}

impl GeneratorError {
    pub fn is_context_overflow(&self) -> bool {
        matches!(self, GeneratorError::ContextOverflow(_))
    }
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Retrieval backend unavailable: {0}")]
    Unavailable(String),

    #[error("Retrieval query failed: {0}")]
    QueryFailed(String),

    #[error("Retrieval timed out after {0}s")]
    Timeout(u64),
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Malformed snapshot: {0}")]
    Snapshot(String),
}

#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("Notification sink not configured: {0}")]
    NotConfigured(String),

    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Notification timed out after {0}s")]
    Timeout(u64),
}
