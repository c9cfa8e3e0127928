//! Chat completion abstraction used by the orchestrator and the remote agents.
//!
//! [`ChatModel`] is the seam: production code talks to an
//! [`OpenAiCompatibleClient`], tests plug in scripted models.

pub mod chat;
pub mod openai;

pub use chat::{
    ChatDelta, ChatMessage, ChatModel, ChatRequest, ChatResponse, ChatRole, ChatStream,
    FunctionCall, FunctionDefinition, StreamAccumulator, ToolCall, ToolCallDelta, ToolDefinition,
    collect_stream,
};
pub use openai::{OpenAiCompatibleClient, OpenAiCompatibleConfig};
