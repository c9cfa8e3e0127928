//! # devconf-orchestrator
//!
//! The DevConf supervisor. Each user message goes through one pipeline:
//!
//! 1. **Preprocess**: detect the language and translate the query to English.
//! 2. **Route**: an LLM picks `google_search_agent`, `github_agent` or a direct reply.
//! 3. **Forward**: the query and the conversation context go to the remote agent over A2A.
//! 4. **Postprocess**: review the reply and translate it back.
//! 5. **Persist**: the user message and the reply are appended to the session store.
//!
//! ```no_run
//! use devconf_orchestrator::{OrchestratorConfig, Supervisor, api::create_app};
//! use devconf_session::SessionBackend;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = OrchestratorConfig::from_env()?;
//! let backend = SessionBackend::open(&config.storage()?).await?;
//! let supervisor = Supervisor::from_config(&config, backend.sessions.clone())?;
//! let app = create_app(&config, supervisor, backend);
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod context;
pub mod postprocess;
pub mod preprocess;
pub mod prompts;
pub mod remote;
pub mod routing;
pub mod supervisor;

pub use config::{OrchestratorConfig, SecurityConfig};
pub use context::{AgentRequest, ContextSummarizer, context_text, parse_summary_output};
pub use preprocess::{Preprocessed, Preprocessor, parse_preprocessing_output};
pub use remote::{RemoteAgent, RemoteAgents};
pub use routing::{IntentRouter, RoutingDecision, parse_routing_decision};
pub use supervisor::{
    Supervisor, SupervisorBuilder, SupervisorEvent, SupervisorReply, SupervisorStream,
};
