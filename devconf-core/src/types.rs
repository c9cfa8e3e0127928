use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = crate::DevconfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "agent" => Ok(Role::Agent),
            other => Err(crate::DevconfError::Validation(format!("unknown role: {}", other))),
        }
    }
}

/// One entry of a conversation. Immutable once appended to a store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// `user` for user turns, the producing agent's name otherwise.
    pub author: String,
    /// Identifier of the user turn this message belongs to.
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default)]
    pub streamed: bool,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(message_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            author: "user".to_string(),
            message_id: message_id.into(),
            thinking: None,
            streamed: false,
            timestamp: Utc::now(),
        }
    }

    pub fn agent(
        message_id: impl Into<String>,
        author: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
            author: author.into(),
            message_id: message_id.into(),
            thinking: None,
            streamed: false,
            timestamp: Utc::now(),
        }
    }

    pub fn with_thinking(mut self, thinking: Option<String>) -> Self {
        self.thinking = thinking.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_streamed(mut self, streamed: bool) -> Self {
        self.streamed = streamed;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(
        id: impl Into<String>,
        app_name: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            app_name: app_name.into(),
            user_id: user_id.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// First user message, used as the conversation title.
    pub fn title(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.trim())
            .filter(|t| !t.is_empty())
    }

    pub fn turn_count(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_str() {
        assert_eq!("agent".parse::<Role>().unwrap(), Role::Agent);
        assert_eq!(Role::User.as_str(), "user");
        assert!("model".parse::<Role>().is_err());
    }

    #[test]
    fn test_conversation_title_and_turns() {
        let mut conversation = Conversation::new("c1", "app", "u1");
        assert_eq!(conversation.title(), None);

        conversation.messages.push(Message::user("m1", "  What is Rust?  "));
        conversation.messages.push(Message::agent("m1", "google_search_agent", "A language."));
        conversation.messages.push(Message::user("m2", "Thanks"));

        assert_eq!(conversation.title(), Some("What is Rust?"));
        assert_eq!(conversation.turn_count(), 2);
    }

    #[test]
    fn test_blank_thinking_is_dropped() {
        let message = Message::agent("m1", "a", "b").with_thinking(Some("  ".into()));
        assert!(message.thinking.is_none());
    }
}
