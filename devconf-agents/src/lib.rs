//! The two remote search agents behind the DevConf supervisor.
//!
//! Each agent is an [`LlmAgent`]: an OpenAI-compatible model plus a tool set,
//! served over A2A by [`devconf_a2a::A2aServer`].
//!
//! | binary | agent | tools |
//! |---|---|---|
//! | `google-search-agent` | `google_search_agent` | `web_search` (Tavily, optional) |
//! | `github-search-agent` | `github_agent` | seven GitHub repository tools |

pub mod cards;
pub mod config;
pub mod github;
pub mod instructions;
pub mod llm_agent;
pub mod search;
pub mod serve;
pub mod tool;

pub use config::{AgentKind, AgentServiceConfig};
pub use llm_agent::{DEFAULT_MAX_TURNS, LlmAgent, LlmAgentBuilder, prompt_from_message};
pub use serve::{build_agent, create_agent_app, run_agent_server, shutdown_signal};
pub use tool::{FunctionTool, Tool};
