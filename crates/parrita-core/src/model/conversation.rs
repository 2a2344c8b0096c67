use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParritaError;

/// One visitor's ongoing conversation, identified by a client-chosen
/// opaque session token. Created on the first message; the qualification
/// flag and payload are set once the heuristics trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub session_id: String,
    pub qualified: bool,
    pub qualification_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            session_id: session_id.into(),
            qualified: false,
            qualification_data: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageRole {
    type Err = ParritaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(ParritaError::Storage(format!(
                "unknown message role: {other}"
            ))),
        }
    }
}

/// Append-only chat message, ordered by creation time within its
/// conversation. Never mutated once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(conversation_id: Uuid, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            conversation_id,
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Per-session request counter. One row per session, updated in place;
/// rows are never deleted, so the table grows with distinct sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitCounter {
    pub session_id: String,
    pub request_count: u32,
    pub window_start: DateTime<Utc>,
}

/// Registered outbound notification target (n8n-style automation hook).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    pub id: Uuid,
    pub trigger_event: String,
    pub webhook_url: String,
    pub is_active: bool,
}
