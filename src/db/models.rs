use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the chat transcript.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub is_assistant: bool,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            is_assistant: false,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            is_assistant: true,
            timestamp: Utc::now(),
        }
    }

    /// Assistant-side notice generated locally rather than by the service.
    pub fn notice(content: impl Into<String>) -> Self {
        Self::assistant(uuid::Uuid::new_v4().to_string(), content)
    }
}
