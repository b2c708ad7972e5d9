//! Docent protocol types and validation logic.
//!
//! This crate implements the records shared by every Docent component:
//! - session identity (`SessionId`)
//! - conversation roles and messages (`ChatRole`, `ChatMessage`)
//! - documentation section classification (`ContentType`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum accepted length for a session identifier, in bytes.
pub const MAX_SESSION_ID_LEN: usize = 128;

/// Opaque conversation identifier, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionIdError {
    #[error("session id cannot be empty")]
    Empty,
    #[error("session id exceeds {MAX_SESSION_ID_LEN} bytes")]
    TooLong,
    #[error("session id cannot contain whitespace or control characters")]
    InvalidCharacter,
}

impl SessionId {
    /// Validate and wrap a raw identifier.
    pub fn new(raw: impl Into<String>) -> Result<Self, SessionIdError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(SessionIdError::Empty);
        }
        if raw.len() > MAX_SESSION_ID_LEN {
            return Err(SessionIdError::TooLong);
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(SessionIdError::InvalidCharacter);
        }
        Ok(Self(raw))
    }

    /// Generate a fresh random session identifier.
    pub fn generate() -> Self {
        Self(format!("sess_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for SessionId {
    type Err = SessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced a conversation turn. Deliberately closed: the context
/// subsystem renders and summarizes only these two roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One turn of a conversation.
///
/// `retrieved_context` is attached after an assistant turn completes and
/// records the documentation excerpts used to produce that specific answer.
/// It is absent for user messages and for assistant answers that needed no
/// retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieved_context: Option<String>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: format!("msg_{}", Uuid::new_v4().simple()),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            retrieved_context: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    pub fn with_retrieved_context(mut self, context: impl Into<String>) -> Self {
        self.retrieved_context = Some(context.into());
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("message id cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Format of an ingested documentation section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Markdown,
    Html,
    Text,
}

impl ContentType {
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Markdown => "markdown",
            ContentType::Html => "html",
            ContentType::Text => "text",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for ContentType {
    fn default() -> Self {
        ContentType::Text
    }
}
