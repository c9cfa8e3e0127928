use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devconf_core::{DevconfError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackType {
    Positive,
    Negative,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Positive => "positive",
            FeedbackType::Negative => "negative",
        }
    }
}

impl std::str::FromStr for FeedbackType {
    type Err = DevconfError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "positive" => Ok(FeedbackType::Positive),
            "negative" => Ok(FeedbackType::Negative),
            other => Err(DevconfError::Validation(format!("unknown feedback type: {}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackRequest {
    pub user_id: String,
    pub conversation_id: String,
    pub message_id: String,
    pub feedback_type: FeedbackType,
    pub comment: Option<String>,
    pub predefined_response: Option<String>,
    pub source_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackRecord {
    pub feedback_id: String,
    pub user_id: String,
    pub conversation_id: String,
    pub message_id: String,
    pub feedback_type: FeedbackType,
    pub comment: Option<String>,
    pub predefined_response: Option<String>,
    pub source_agent: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Feedback is unique per (user, message): a second submission replaces the
/// first while keeping its id and creation time.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn upsert_feedback(&self, req: FeedbackRequest) -> Result<FeedbackRecord>;

    async fn get_feedback(&self, user_id: &str, message_id: &str)
    -> Result<Option<FeedbackRecord>>;
}
