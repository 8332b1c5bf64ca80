use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    #[default]
    User,
    Generated,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Generated => "generated",
        }
    }
}

/// One conversation turn. Immutable once appended to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub role: MessageRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
}

impl Message {
    /// User-authored message; `author_id` records who wrote it.
    pub fn user(text: impl Into<String>, author_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamp: Utc::now(),
            role: MessageRole::User,
            author_id: Some(author_id.into()),
        }
    }

    pub fn generated(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamp: Utc::now(),
            role: MessageRole::Generated,
            author_id: None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }
}

/// Newline-joined text of every message, in order.
pub fn transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| m.text.as_str())
        .filter(|t| !t.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = Message::generated("How did that feel?");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "generated");
        assert!(value.get("author_id").is_none());
    }

    #[test]
    fn test_role_defaults_to_user() {
        let value = serde_json::json!({
            "text": "hi",
            "timestamp": "2026-01-01T10:00:00Z",
            "role": "user"
        });
        let msg: Message = serde_json::from_value(value).unwrap();
        assert!(msg.is_user());
        assert!(msg.author_id.is_none());
        assert_eq!(MessageRole::default(), MessageRole::User);
    }

    #[test]
    fn test_transcript_skips_blank_lines() {
        let messages = vec![
            Message::user("first", "u1"),
            Message::user("   ", "u1"),
            Message::generated("second"),
        ];
        assert_eq!(transcript(&messages), "first\nsecond");
    }
}
