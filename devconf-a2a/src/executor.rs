use crate::types::Message;
use async_trait::async_trait;
use devconf_core::Result;
use futures::Stream;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// What an agent produces while handling one A2A message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutput {
    /// Status line shown while the agent works (e.g. "Searching GitHub...").
    Progress(String),
    /// Next piece of the reply text.
    TextChunk(String),
}

pub type AgentOutputStream = Pin<Box<dyn Stream<Item = Result<AgentOutput>> + Send>>;

/// Everything the executor needs for one task.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub task_id: String,
    pub context_id: String,
    pub message: Message,
    /// Fired by `tasks/cancel`. The server also stops polling the stream.
    pub cancel: CancellationToken,
}

/// The agent behind an A2A endpoint.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(&self, ctx: RequestContext) -> Result<AgentOutputStream>;
}
