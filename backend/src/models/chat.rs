//! Chat sessions with embedded message history (`chat_sessions` collection).

use bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_SESSION_TITLE: &str = "New Conversation";

/// Auto-titling truncates the first user message to this many characters.
pub const TITLE_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A single turn embedded in the session document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime,
}

impl ChatMessage {
    pub fn now(role: MessageRole, content: String) -> Self {
        Self {
            role,
            content,
            timestamp: DateTime::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatMetadata {
    #[serde(default)]
    pub token_count: i64,
    #[serde(default)]
    pub model_version: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub model_id: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub metadata: ChatMetadata,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl ChatSession {
    pub fn new(user_id: String, model_id: String, system_prompt: Option<String>) -> Self {
        let now = DateTime::now();
        let messages = system_prompt
            .iter()
            .map(|p| ChatMessage::now(MessageRole::System, p.clone()))
            .collect();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            title: DEFAULT_SESSION_TITLE.to_string(),
            model_id,
            messages,
            metadata: ChatMetadata {
                system_prompt,
                ..Default::default()
            },
            created_at: now,
            updated_at: now,
        }
    }

    /// Title derived from the first user message, truncated on a char
    /// boundary. Returns `None` when no user message exists yet.
    pub fn derived_title(&self) -> Option<String> {
        let first = self
            .messages
            .iter()
            .find(|m| m.role == MessageRole::User)?;
        let mut title: String = first.content.chars().take(TITLE_MAX_CHARS).collect();
        if first.content.chars().count() > TITLE_MAX_CHARS {
            title.push_str("...");
        }
        Some(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_title_truncates() {
        let mut session = ChatSession::new("u1".into(), "gemini-pro".into(), None);
        session.messages.push(ChatMessage::now(
            MessageRole::User,
            "a".repeat(80),
        ));
        let title = session.derived_title().unwrap();
        assert_eq!(title, format!("{}...", "a".repeat(50)));
    }

    #[test]
    fn test_derived_title_short_message_kept_verbatim() {
        let mut session = ChatSession::new("u1".into(), "gemini-pro".into(), None);
        session
            .messages
            .push(ChatMessage::now(MessageRole::User, "Hello there".into()));
        assert_eq!(session.derived_title().unwrap(), "Hello there");
    }

    #[test]
    fn test_derived_title_skips_system_messages() {
        let session = ChatSession::new(
            "u1".into(),
            "gemini-pro".into(),
            Some("You are terse.".into()),
        );
        assert!(session.derived_title().is_none());
    }
}
