//! Shared building blocks for the DevConf supervisor and its remote agents.
//!
//! - [`DevconfError`] and [`Result`]: the error type every crate returns
//! - [`Conversation`] and [`Message`]: session data held by the stores
//! - [`AgentRoutes`]: the static intent to remote agent table

pub mod error;
pub mod route;
pub mod types;

pub use error::{DevconfError, ErrorKind, Result};
pub use route::{AgentRoute, AgentRoutes, Intent, agent_names};
pub use types::{Conversation, Message, Role};

/// Application name sessions are registered under.
pub const APP_NAME: &str = "devconf_multi_agent";
