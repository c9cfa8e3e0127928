use anyhow::{Context, Result, bail};
use std::env;
use std::time::Duration;

/// Which remote agent a process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    GoogleSearch,
    Github,
}

impl AgentKind {
    pub fn default_port(&self) -> u16 {
        match self {
            AgentKind::GoogleSearch => 8001,
            AgentKind::Github => 8002,
        }
    }

    fn model_var(&self) -> &'static str {
        match self {
            AgentKind::GoogleSearch => "GOOGLE_SEARCH_AGENT_MODEL",
            AgentKind::Github => "GITHUB_SEARCH_AGENT_MODEL",
        }
    }

    pub fn service_name(&self) -> &'static str {
        match self {
            AgentKind::GoogleSearch => "google-search-agent",
            AgentKind::Github => "github-search-agent",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentServiceConfig {
    pub kind: AgentKind,
    pub host: String,
    pub port: u16,
    /// Base URL advertised in the agent card.
    pub public_url: String,
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub model: String,
    pub request_timeout: Option<Duration>,
    pub connect_timeout: Duration,
    pub verify_ssl: bool,
    pub github_token: Option<String>,
    pub tavily_api_key: Option<String>,
    pub expose_error_details: bool,
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn flag(key: &str, default: bool) -> bool {
    var(key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn seconds(key: &str) -> Result<Option<Duration>> {
    var(key).map(|v| parse_seconds(key, &v)).transpose()
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration> {
    let secs = value
        .parse::<f64>()
        .with_context(|| format!("{} must be a number of seconds, got {:?}", key, value))?;
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("{} must be a non-negative number of seconds, got {:?}", key, value))
}

impl AgentServiceConfig {
    pub fn from_env(kind: AgentKind) -> Result<Self> {
        let port = match var("PORT") {
            Some(p) => p.parse().with_context(|| format!("PORT must be a port number, got {:?}", p))?,
            None => kind.default_port(),
        };
        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let public_url = var("PUBLIC_URL").unwrap_or_else(|| format!("http://localhost:{}", port));

        let openai_key = var("OPENAI_API_KEY").unwrap_or_else(|| "empty".to_string());
        let llm_api_key = match kind {
            AgentKind::GoogleSearch => var("GOOGLE_SEARCH_AGENT_API_KEY").unwrap_or(openai_key),
            AgentKind::Github => openai_key,
        };
        let model = var(kind.model_var())
            .with_context(|| format!("{} environment variable not set", kind.model_var()))?;

        let github_token = var("GITHUB_TOKEN");
        if kind == AgentKind::Github && github_token.is_none() {
            bail!("GITHUB_TOKEN environment variable is not set");
        }

        Ok(Self {
            kind,
            host,
            port,
            public_url,
            llm_base_url: var("OPENAI_COMPATIBLE_HOST")
                .unwrap_or_else(|| devconf_model::openai::DEFAULT_BASE_URL.to_string()),
            llm_api_key,
            model,
            request_timeout: Some(seconds("DEFAULT_TIMEOUT")?.unwrap_or(Duration::from_secs(120))),
            connect_timeout: seconds("CONNECT_TIMEOUT")?.unwrap_or(Duration::from_secs(5)),
            verify_ssl: flag("VERIFY_SSL", false),
            github_token,
            tavily_api_key: var("TAVILY_API_KEY"),
            expose_error_details: flag("EXPOSE_ERROR_DETAILS", false),
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
