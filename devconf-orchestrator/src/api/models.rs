//! Request and response bodies of the REST API.

use chrono::{DateTime, Utc};
use devconf_core::{Conversation, Role};
use devconf_session::{FeedbackRecord, FeedbackType};
use serde::{Deserialize, Serialize};

pub const UNTITLED_CONVERSATION: &str = "Untitled Conversation";
pub const NO_RESPONSE: &str = "No response generated";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConversationResponse {
    pub conversation_id: String,
    pub user_id: String,
    pub app_name: String,
}

fn default_stream() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    pub input: String,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageChunkResponse {
    pub content: Option<String>,
    pub conversation_id: String,
    pub message_id: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub thinking: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Progress,
    Content,
    Done,
    Error,
}

/// Payload of one SSE `data:` line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEventData {
    pub author: String,
    pub is_final: bool,
    pub conversation_id: String,
    pub message_id: String,
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub conversation_id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub turn_count: usize,
}

impl From<&Conversation> for SessionSummary {
    fn from(conversation: &Conversation) -> Self {
        Self {
            conversation_id: conversation.id.clone(),
            user_id: conversation.user_id.clone(),
            title: conversation.title().unwrap_or(UNTITLED_CONVERSATION).to_string(),
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
            turn_count: conversation.turn_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummary>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub conversation_id: String,
    pub message_id: String,
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub summary: SessionSummary,
    pub turns: Vec<ConversationTurn>,
}

impl From<&Conversation> for SessionDetail {
    /// One turn per user message, answered by the agent message sharing its id.
    fn from(conversation: &Conversation) -> Self {
        let turns = conversation
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|question| {
                let answer = conversation
                    .messages
                    .iter()
                    .find(|m| m.role == Role::Agent && m.message_id == question.message_id);
                ConversationTurn {
                    conversation_id: conversation.id.clone(),
                    message_id: question.message_id.clone(),
                    question: question.content.clone(),
                    answer: answer.map(|a| a.content.clone()).unwrap_or_default(),
                    thinking: answer.and_then(|a| a.thinking.clone()),
                    timestamp: question.timestamp,
                }
            })
            .collect();
        Self { summary: SessionSummary::from(conversation), turns }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackBody {
    pub feedback_type: FeedbackType,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub predefined_response: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackResponse {
    pub feedback_id: String,
    pub conversation_id: String,
    pub message_id: String,
    pub feedback_type: FeedbackType,
    pub comment: Option<String>,
    pub predefined_response: Option<String>,
    pub source_agent: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FeedbackRecord> for FeedbackResponse {
    fn from(record: FeedbackRecord) -> Self {
        Self {
            feedback_id: record.feedback_id,
            conversation_id: record.conversation_id,
            message_id: record.message_id,
            feedback_type: record.feedback_type,
            comment: record.comment,
            predefined_response: record.predefined_response,
            source_agent: record.source_agent,
            user_id: record.user_id,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devconf_core::Message;

    #[test]
    fn test_session_detail_pairs_turns_by_message_id() {
        let mut conversation = Conversation::new("c1", "app", "u1");
        conversation.messages.push(Message::user("m1", "What is axum?"));
        conversation.messages.push(
            Message::agent("m1", "google_search_agent", "A web framework.")
                .with_thinking(Some("looked it up".into())),
        );
        conversation.messages.push(Message::user("m2", "Stars?"));

        let detail = SessionDetail::from(&conversation);
        assert_eq!(detail.summary.title, "What is axum?");
        assert_eq!(detail.summary.turn_count, 2);
        assert_eq!(detail.turns[0].answer, "A web framework.");
        assert_eq!(detail.turns[0].thinking.as_deref(), Some("looked it up"));
        assert_eq!(detail.turns[1].answer, "");
    }

    #[test]
    fn test_untitled_summary() {
        let summary = SessionSummary::from(&Conversation::new("c1", "app", "u1"));
        assert_eq!(summary.title, UNTITLED_CONVERSATION);
        assert_eq!(summary.turn_count, 0);
    }

    #[test]
    fn test_message_request_streams_by_default() {
        let request: MessageRequest = serde_json::from_str(r#"{"input": "hi"}"#).unwrap();
        assert!(request.stream);
    }
}
