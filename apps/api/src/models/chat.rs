//! Chat models for the movie assistant
//!
//! Database models for conversations and their messages. Assistant message
//! content is either plain text or a serialized `AssistantPayload`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Message role enum matching the PostgreSQL role column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    /// Returns the string representation of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Conversation record from the conversations table
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Conversation {
    /// Unique conversation identifier
    pub id: Uuid,

    /// User who owns this conversation
    pub user_id: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Bumped every time a message is appended
    pub updated_at: DateTime<Utc>,
}

/// Message record from the messages table
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Message {
    /// Unique message identifier
    pub id: Uuid,

    /// Conversation this message belongs to
    pub conversation_id: Uuid,

    /// Message role
    pub role: MessageRole,

    /// Plain text, or a JSON payload for structured assistant replies
    pub content: String,

    /// Message sequence within conversation (ties on `created_at` are common)
    pub sequence_number: i32,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Input for appending a message
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
}

impl NewMessage {
    pub fn user(conversation_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            conversation_id,
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(conversation_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            conversation_id,
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}
