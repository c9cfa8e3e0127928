use crate::{
    CreateRequest, FeedbackRecord, FeedbackRequest, FeedbackStore, GetRequest, ListRequest,
    SessionStore,
};
use async_trait::async_trait;
use chrono::Utc;
use devconf_core::{Conversation, DevconfError, Message, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// Process-local store. Conversations are keyed by id alone so that
/// `append`/`read` need no owner information.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    conversations: Arc<RwLock<HashMap<String, Conversation>>>,
    feedback: Arc<RwLock<HashMap<(String, String), FeedbackRecord>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| DevconfError::Session("session lock poisoned".into()))
}

fn write_lock<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| DevconfError::Session("session lock poisoned".into()))
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, req: CreateRequest) -> Result<Conversation> {
        let id = req.conversation_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let conversation = Conversation::new(id.clone(), req.app_name, req.user_id);

        let mut conversations = write_lock(&self.conversations)?;
        if conversations.contains_key(&id) {
            return Err(DevconfError::Validation(format!("conversation already exists: {}", id)));
        }
        conversations.insert(id, conversation.clone());
        Ok(conversation)
    }

    async fn get(&self, req: GetRequest) -> Result<Conversation> {
        let conversations = read_lock(&self.conversations)?;
        conversations
            .get(&req.conversation_id)
            .filter(|c| c.app_name == req.app_name && c.user_id == req.user_id)
            .cloned()
            .ok_or_else(|| {
                DevconfError::not_found(format!("conversation {}", req.conversation_id))
            })
    }

    async fn list(&self, req: ListRequest) -> Result<Vec<Conversation>> {
        let conversations = read_lock(&self.conversations)?;
        let mut result: Vec<Conversation> = conversations
            .values()
            .filter(|c| c.app_name == req.app_name && c.user_id == req.user_id)
            .cloned()
            .collect();
        drop(conversations);

        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        if let Some(limit) = req.limit {
            result.truncate(limit);
        }
        Ok(result)
    }

    async fn append(&self, conversation_id: &str, message: Message) -> Result<()> {
        let mut conversations = write_lock(&self.conversations)?;
        let conversation = conversations
            .get_mut(conversation_id)
            .ok_or_else(|| DevconfError::not_found(format!("conversation {}", conversation_id)))?;
        conversation.updated_at = message.timestamp.max(conversation.updated_at);
        conversation.messages.push(message);
        Ok(())
    }

    async fn read(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let conversations = read_lock(&self.conversations)?;
        conversations
            .get(conversation_id)
            .map(|c| c.messages.clone())
            .ok_or_else(|| DevconfError::not_found(format!("conversation {}", conversation_id)))
    }

    async fn health_check(&self) -> Result<()> {
        read_lock(&self.conversations).map(|_| ())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

#[async_trait]
impl FeedbackStore for InMemorySessionStore {
    async fn upsert_feedback(&self, req: FeedbackRequest) -> Result<FeedbackRecord> {
        let now = Utc::now();
        let key = (req.user_id.clone(), req.message_id.clone());

        let mut feedback = write_lock(&self.feedback)?;
        let record = match feedback.get(&key) {
            Some(existing) => FeedbackRecord {
                feedback_id: existing.feedback_id.clone(),
                created_at: existing.created_at,
                user_id: req.user_id,
                conversation_id: req.conversation_id,
                message_id: req.message_id,
                feedback_type: req.feedback_type,
                comment: req.comment,
                predefined_response: req.predefined_response,
                source_agent: req.source_agent,
                updated_at: now,
            },
            None => FeedbackRecord {
                feedback_id: Uuid::new_v4().to_string(),
                created_at: now,
                user_id: req.user_id,
                conversation_id: req.conversation_id,
                message_id: req.message_id,
                feedback_type: req.feedback_type,
                comment: req.comment,
                predefined_response: req.predefined_response,
                source_agent: req.source_agent,
                updated_at: now,
            },
        };
        feedback.insert(key, record.clone());
        Ok(record)
    }

    async fn get_feedback(
        &self,
        user_id: &str,
        message_id: &str,
    ) -> Result<Option<FeedbackRecord>> {
        let feedback = read_lock(&self.feedback)?;
        Ok(feedback.get(&(user_id.to_string(), message_id.to_string())).cloned())
    }
}
