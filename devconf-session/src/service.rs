use async_trait::async_trait;
use devconf_core::{Conversation, Message, Result};

#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub app_name: String,
    pub user_id: String,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GetRequest {
    pub app_name: String,
    pub user_id: String,
    pub conversation_id: String,
}

#[derive(Debug, Clone)]
pub struct ListRequest {
    pub app_name: String,
    pub user_id: String,
    /// Maximum number of conversations, most recently active first.
    pub limit: Option<usize>,
}

/// Append/read contract shared by every conversation backend.
///
/// Messages of a conversation are always returned in the order they were
/// appended. Appending to an unknown conversation is a `NotFound` error.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, req: CreateRequest) -> Result<Conversation>;

    /// Fails with `NotFound` when the id is unknown or owned by another user.
    async fn get(&self, req: GetRequest) -> Result<Conversation>;

    async fn list(&self, req: ListRequest) -> Result<Vec<Conversation>>;

    async fn append(&self, conversation_id: &str, message: Message) -> Result<()>;

    async fn read(&self, conversation_id: &str) -> Result<Vec<Message>>;

    async fn health_check(&self) -> Result<()>;

    /// Whether conversations survive a process restart.
    fn is_persistent(&self) -> bool;
}
