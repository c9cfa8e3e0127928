use anyhow::{Context, Result, bail};
use devconf_a2a::A2aClientConfig;
use devconf_core::{APP_NAME, AgentRoutes, Intent};
use devconf_session::StorageConfig;
use std::env;
use std::time::Duration;

pub const DEFAULT_API_PREFIX: &str = "/api/devconf/v1";
pub const DEFAULT_SUMMARIZATION_MIN_CHARS: usize = 2000;

/// HTTP hardening applied by [`create_app`](crate::api::create_app).
#[derive(Clone, Debug)]
pub struct SecurityConfig {
    /// Allowed CORS origins. Empty allows any origin.
    pub allowed_origins: Vec<String>,
    pub max_body_size: usize,
    pub request_timeout: Duration,
    /// Include internal error messages in responses.
    pub expose_error_details: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            max_body_size: 10 * 1024 * 1024,
            request_timeout: Duration::from_secs(300),
            expose_error_details: false,
        }
    }
}

/// Settings of the supervisor process.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub app_name: String,
    pub api_prefix: String,
    pub host: String,
    pub port: u16,
    pub supervisor_model: String,
    pub preprocessing_model: String,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub google_search_agent_url: String,
    pub github_agent_url: String,
    pub verify_ssl: bool,
    /// `None` disables the per-request timeout of outbound calls.
    pub default_timeout: Option<Duration>,
    pub connect_timeout: Duration,
    pub database_url: Option<String>,
    pub use_database_sessions: bool,
    pub preprocessing_enabled: bool,
    pub postprocessing_enabled: bool,
    pub summarization_min_chars: usize,
    pub security: SecurityConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            supervisor_model: "openai/gpt-oss-120b".to_string(),
            preprocessing_model: "openai/gpt-oss-20b".to_string(),
            llm_api_key: "empty".to_string(),
            llm_base_url: devconf_model::openai::DEFAULT_BASE_URL.to_string(),
            google_search_agent_url: "http://localhost:8001".to_string(),
            github_agent_url: "http://localhost:8002".to_string(),
            verify_ssl: false,
            default_timeout: Some(Duration::from_secs(120)),
            connect_timeout: Duration::from_secs(5),
            database_url: None,
            use_database_sessions: false,
            preprocessing_enabled: true,
            postprocessing_enabled: true,
            summarization_min_chars: DEFAULT_SUMMARIZATION_MIN_CHARS,
            security: SecurityConfig::default(),
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn flag(key: &str, default: bool) -> bool {
    var(key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn number<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match var(key) {
        Some(v) => match v.parse() {
            Ok(n) => Ok(Some(n)),
            Err(_) => bail!("{} must be a number, got {:?}", key, v),
        },
        None => Ok(None),
    }
}

fn seconds(key: &str) -> Result<Option<Duration>> {
    var(key).map(|v| parse_seconds(key, &v)).transpose()
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration> {
    let Ok(secs) = value.parse::<f64>() else {
        bail!("{} must be a number, got {:?}", key, value);
    };
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) => Ok(duration),
        Err(_) => bail!("{} must be a non-negative number of seconds, got {:?}", key, value),
    }
}

/// Agent URLs keep the empty string, which disables the route.
fn agent_url(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(v) => v.trim().to_string(),
        Err(_) => default.to_string(),
    }
}

impl OrchestratorConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let security = SecurityConfig {
            allowed_origins: var("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',').map(str::trim).filter(|o| !o.is_empty()).map(String::from).collect()
                })
                .unwrap_or_default(),
            max_body_size: number("MAX_BODY_SIZE")?.unwrap_or(defaults.security.max_body_size),
            request_timeout: seconds("REQUEST_TIMEOUT")?.unwrap_or(defaults.security.request_timeout),
            expose_error_details: flag("EXPOSE_ERROR_DETAILS", false),
        };

        let config = Self {
            app_name: var("APP_NAME").unwrap_or(defaults.app_name),
            api_prefix: var("API_ROUTER_PATH_PREFIX").unwrap_or(defaults.api_prefix),
            host: var("HOST").unwrap_or(defaults.host),
            port: number("PORT")?.unwrap_or(defaults.port),
            supervisor_model: var("SUPERVISOR_MODEL").unwrap_or(defaults.supervisor_model),
            preprocessing_model: var("PREPROCESSING_MODEL").unwrap_or(defaults.preprocessing_model),
            llm_api_key: var("OPENAI_API_KEY").unwrap_or(defaults.llm_api_key),
            llm_base_url: var("OPENAI_COMPATIBLE_HOST").unwrap_or(defaults.llm_base_url),
            google_search_agent_url: agent_url(
                "GOOGLE_SEARCH_AGENT_URL",
                &defaults.google_search_agent_url,
            ),
            github_agent_url: agent_url("GITHUB_AGENT_URL", &defaults.github_agent_url),
            verify_ssl: flag("VERIFY_SSL", false),
            default_timeout: Some(seconds("DEFAULT_TIMEOUT")?.unwrap_or(Duration::from_secs(120))),
            connect_timeout: seconds("CONNECT_TIMEOUT")?.unwrap_or(defaults.connect_timeout),
            database_url: var("DATABASE_URL"),
            use_database_sessions: flag("USE_DATABASE_SESSIONS", false),
            preprocessing_enabled: flag("PREPROCESSING_ENABLED", true),
            postprocessing_enabled: flag("POSTPROCESSING_ENABLED", true),
            summarization_min_chars: number("SUMMARIZATION_MIN_CHARS")?
                .unwrap_or(defaults.summarization_min_chars),
            security,
        };
        config.storage().context("invalid session storage settings")?;
        Ok(config)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Setting a URL also switches sessions to the database.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self.use_database_sessions = true;
        self
    }

    pub fn with_agent_urls(mut self, google_search: impl Into<String>, github: impl Into<String>) -> Self {
        self.google_search_agent_url = google_search.into();
        self.github_agent_url = github.into();
        self
    }

    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn storage(&self) -> devconf_core::Result<StorageConfig> {
        StorageConfig::from_settings(self.use_database_sessions, self.database_url.as_deref())
    }

    pub fn agent_routes(&self) -> AgentRoutes {
        AgentRoutes::new()
            .with_route(Intent::GoogleSearch, &self.google_search_agent_url)
            .with_route(Intent::GithubSearch, &self.github_agent_url)
    }

    pub fn a2a_client_config(&self) -> A2aClientConfig {
        A2aClientConfig {
            timeout: self.default_timeout,
            connect_timeout: self.connect_timeout,
            verify_ssl: self.verify_ssl,
        }
    }
}
