//! Agent-to-Agent (A2A) protocol plumbing shared by the supervisor and the
//! remote agents.
//!
//! The server side wraps any [`AgentExecutor`] in an axum [`Router`](axum::Router)
//! exposing the agent card and the JSON-RPC endpoints:
//!
//! - `GET /.well-known/agent.json` (also `/.well-known/agent-card.json`)
//! - `POST /a2a` for `message/send`, `tasks/get` and `tasks/cancel`
//! - `POST /a2a/stream` for `message/stream` over SSE
//!
//! The client side ([`A2aClient`]) talks to those endpoints and maps transport
//! failures onto [`DevconfError::DependencyUnavailable`](devconf_core::DevconfError).

pub mod client;
pub mod executor;
pub mod jsonrpc;
pub mod server;
pub mod types;

pub use client::{A2aClient, A2aClientConfig, UpdateStream, agent_outputs, reply_text};
pub use executor::{AgentExecutor, AgentOutput, AgentOutputStream, RequestContext};
pub use jsonrpc::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, MessageSendParams, Task, TaskIdParams, methods,
};
pub use server::{A2aServer, CancelOutcome, TaskStore};
pub use types::{
    AgentCapabilities, AgentCard, AgentSkill, Artifact, Message, MessageBuilder, PROTOCOL_VERSION,
    Part, Role, TaskArtifactUpdateEvent, TaskState, TaskStatus, TaskStatusUpdateEvent, UpdateEvent,
};
