use serde::{Deserialize, Serialize};

pub mod agent_names {
    pub const SUPERVISOR_AGENT: &str = "supervisor_agent";
    pub const GOOGLE_SEARCH_AGENT: &str = "google_search_agent";
    pub const GITHUB_AGENT: &str = "github_agent";
}

/// What the user wants done with a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    GoogleSearch,
    GithubSearch,
}

impl Intent {
    pub const ALL: [Intent; 2] = [Intent::GoogleSearch, Intent::GithubSearch];

    /// Name of the remote agent serving this intent.
    pub fn agent_name(&self) -> &'static str {
        match self {
            Intent::GoogleSearch => agent_names::GOOGLE_SEARCH_AGENT,
            Intent::GithubSearch => agent_names::GITHUB_AGENT,
        }
    }

    pub fn from_agent_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|intent| intent.agent_name() == name)
    }

    /// Status line streamed to the client while the agent works.
    pub fn progress_message(&self) -> &'static str {
        match self {
            Intent::GoogleSearch => "Searching Google...",
            Intent::GithubSearch => "Searching GitHub...",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRoute {
    pub intent: Intent,
    pub name: String,
    pub base_url: String,
}

/// Static intent to remote agent table. Routes with an empty base URL are
/// treated as disabled.
#[derive(Debug, Clone, Default)]
pub struct AgentRoutes {
    routes: Vec<AgentRoute>,
}

impl AgentRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, intent: Intent, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        self.routes.retain(|r| r.intent != intent);
        if !base_url.is_empty() {
            self.routes.push(AgentRoute {
                intent,
                name: intent.agent_name().to_string(),
                base_url,
            });
        }
        self
    }

    pub fn select(&self, intent: Intent) -> Option<&AgentRoute> {
        self.routes.iter().find(|r| r.intent == intent)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentRoute> {
        self.routes.iter()
    }
}
