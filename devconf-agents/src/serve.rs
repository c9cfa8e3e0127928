use crate::cards::{github_card, google_search_card};
use crate::config::{AgentKind, AgentServiceConfig};
use crate::github::{GithubClient, github_tools};
use crate::instructions::{GITHUB_AGENT_INSTRUCTION, GOOGLE_SEARCH_AGENT_INSTRUCTION};
use crate::llm_agent::LlmAgent;
use crate::search::{TavilyClient, web_search_tool};
use anyhow::{Context, Result};
use axum::Router;
use devconf_a2a::A2aServer;
use devconf_core::agent_names;
use devconf_model::{ChatModel, OpenAiCompatibleClient, OpenAiCompatibleConfig};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

fn chat_model(config: &AgentServiceConfig) -> Result<Arc<dyn ChatModel>> {
    let client = OpenAiCompatibleClient::new(
        OpenAiCompatibleConfig::new(&config.llm_api_key, &config.model)
            .with_provider_name(config.kind.service_name())
            .with_base_url(&config.llm_base_url)
            .with_timeout(config.request_timeout)
            .with_connect_timeout(config.connect_timeout)
            .with_verify_ssl(config.verify_ssl),
    )?;
    Ok(Arc::new(client))
}

/// Build the agent for `config.kind` with its tools.
pub fn build_agent(config: &AgentServiceConfig, model: Arc<dyn ChatModel>) -> Result<LlmAgent> {
    let agent = match config.kind {
        AgentKind::GoogleSearch => {
            let mut builder = LlmAgent::builder(agent_names::GOOGLE_SEARCH_AGENT)
                .instruction(GOOGLE_SEARCH_AGENT_INSTRUCTION)
                .model(model);
            match &config.tavily_api_key {
                Some(key) => builder = builder.tool(web_search_tool(TavilyClient::new(key.clone())?)),
                None => tracing::warn!(
                    "TAVILY_API_KEY not set; relying on the model's own search grounding"
                ),
            }
            builder.build()?
        }
        AgentKind::Github => {
            let token = config.github_token.as_deref().context("GITHUB_TOKEN is required")?;
            LlmAgent::builder(agent_names::GITHUB_AGENT)
                .instruction(GITHUB_AGENT_INSTRUCTION)
                .model(model)
                .tools(github_tools(GithubClient::new(token)?))
                .build()?
        }
    };
    Ok(agent)
}

/// A2A router for an agent, with the HTTP layers every agent process uses.
pub fn create_agent_app(config: &AgentServiceConfig, agent: LlmAgent) -> Router {
    let card = match config.kind {
        AgentKind::GoogleSearch => google_search_card(&config.public_url),
        AgentKind::Github => github_card(&config.public_url),
    };

    A2aServer::new(card, Arc::new(agent))
        .with_expose_error_details(config.expose_error_details)
        .router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

/// Resolves on Ctrl-C. If the handler cannot be installed this never
/// resolves, and the server runs until it is killed.
pub async fn shutdown_signal() {
    wait_for_shutdown(tokio::signal::ctrl_c()).await
}

async fn wait_for_shutdown(signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C, graceful shutdown disabled");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

pub async fn run_agent_server(config: AgentServiceConfig) -> Result<()> {
    let model = chat_model(&config)?;
    let agent = build_agent(&config, model)?;
    tracing::info!(
        agent = agent.name(),
        model = %config.model,
        tools = agent.tools().len(),
        public_url = %config.public_url,
        "agent configured"
    );
    let app = create_agent_app(&config, agent);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("{} listening on http://{}", config.kind.service_name(), addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}
