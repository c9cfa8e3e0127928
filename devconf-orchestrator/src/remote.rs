use devconf_a2a::{A2aClient, A2aClientConfig, AgentOutputStream, Message, reply_text};
use devconf_core::{AgentRoute, AgentRoutes, DevconfError, Intent, Result};
use futures::StreamExt;

/// A remote agent reached over A2A.
#[derive(Clone)]
pub struct RemoteAgent {
    route: AgentRoute,
    client: A2aClient,
}

impl RemoteAgent {
    pub fn new(route: AgentRoute, config: &A2aClientConfig) -> Result<Self> {
        let client = A2aClient::new(&route.base_url, config)?;
        Ok(Self { route, client })
    }

    pub fn name(&self) -> &str {
        &self.route.name
    }

    pub fn intent(&self) -> Intent {
        self.route.intent
    }

    pub fn base_url(&self) -> &str {
        &self.route.base_url
    }

    /// Transport failures are reported under the agent's name.
    fn map_error(&self, e: DevconfError) -> DevconfError {
        match e {
            DevconfError::DependencyUnavailable(detail) => {
                tracing::warn!(agent = %self.route.name, detail = %detail, "remote agent unavailable");
                DevconfError::DependencyUnavailable(self.route.name.clone())
            }
            other => other,
        }
    }

    pub async fn stream(&self, message: Message) -> Result<AgentOutputStream> {
        let outputs = self.client.stream_reply(message).await.map_err(|e| self.map_error(e))?;
        let this = self.clone();
        Ok(Box::pin(outputs.map(move |item| item.map_err(|e| this.map_error(e)))))
    }

    pub async fn send(&self, message: Message) -> Result<String> {
        let task = self.client.send_message(message).await.map_err(|e| self.map_error(e))?;
        reply_text(&task)
    }

    /// Reachable when the agent card can be fetched.
    pub async fn check(&self) -> Result<()> {
        self.client.resolve_agent_card().await.map(|_| ()).map_err(|e| self.map_error(e))
    }
}

/// Clients for every enabled route.
#[derive(Clone, Default)]
pub struct RemoteAgents {
    agents: Vec<RemoteAgent>,
}

impl RemoteAgents {
    pub fn from_routes(routes: &AgentRoutes, config: &A2aClientConfig) -> Result<Self> {
        let agents = routes
            .iter()
            .map(|route| RemoteAgent::new(route.clone(), config))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { agents })
    }

    pub fn get(&self, intent: Intent) -> Option<&RemoteAgent> {
        self.agents.iter().find(|a| a.intent() == intent)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteAgent> {
        self.agents.iter()
    }
}
