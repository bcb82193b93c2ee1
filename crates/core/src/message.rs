//! Message and session identity types.
//!
//! Messages are immutable once appended to a session. Their token count is
//! computed by the session at append time with the configured counter, so
//! budget decisions never re-tokenize history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Longest accepted client-supplied session id.
pub const MAX_SESSION_ID_LEN: usize = 128;

/// Opaque session identifier, client-supplied or generated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept a client-supplied id, or generate one when absent.
    ///
    /// Ids are restricted to `[A-Za-z0-9_-]` so they are safe to log and to
    /// use as map keys without normalization.
    pub fn parse(raw: Option<&str>) -> Result<Self, ValidationError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::new()),
            Some(s) if s.len() > MAX_SESSION_ID_LEN => Err(ValidationError::InvalidSessionId),
            Some(s)
                if s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') =>
            {
                Ok(Self(s.to_string()))
            }
            Some(_) => Err(ValidationError::InvalidSessionId),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The assistant
    Assistant,
    /// System instructions and synthetic summaries
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Token count under the configured counting scheme, including
    /// per-message framing overhead. Zero until counted.
    #[serde(default)]
    pub token_count: usize,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            token_count: 0,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Attach a precomputed token count.
    pub fn with_token_count(mut self, tokens: usize) -> Self {
        self.token_count = tokens;
        self
    }
}

/// Collapse whitespace runs and validate length.
///
/// Returns the cleaned message text or the validation failure that must be
/// reported to the caller before any core logic runs.
pub fn sanitize_input(raw: &str, max_chars: usize) -> Result<String, ValidationError> {
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    let length = cleaned.chars().count();
    if length > max_chars {
        return Err(ValidationError::MessageTooLong { length, limit: max_chars });
    }
    Ok(cleaned)
}
