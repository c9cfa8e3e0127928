use anyhow::{Context, Result};
use clap::Parser;
use devconf_orchestrator::api::{create_app, shutdown_signal};
use devconf_orchestrator::{OrchestratorConfig, Supervisor};
use devconf_session::SessionBackend;
use std::net::SocketAddr;

/// DevConf supervisor: routes questions to the search agents.
#[derive(Parser)]
#[command(name = "devconf-orchestrator", version, about)]
struct Cli {
    /// Interface to bind (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Store conversations in this database (overrides DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = devconf_telemetry::init_telemetry("devconf-orchestrator") {
        eprintln!("Failed to initialize telemetry: {}", e);
    }

    let mut config = OrchestratorConfig::from_env()?;
    if let Some(host) = cli.host {
        config = config.with_host(host);
    }
    if let Some(port) = cli.port {
        config = config.with_port(port);
    }
    if let Some(url) = cli.database_url {
        config = config.with_database_url(url);
    }
    if config.security.allowed_origins.is_empty() {
        tracing::warn!("ALLOWED_ORIGINS is empty; CORS allows any origin");
    }

    let backend = SessionBackend::open(&config.storage()?).await?;
    let supervisor = Supervisor::from_config(&config, backend.sessions.clone())?;
    let app = create_app(&config, supervisor, backend);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(
        prefix = %config.api_prefix,
        preprocessing = config.preprocessing_enabled,
        postprocessing = config.postprocessing_enabled,
        "devconf-orchestrator listening on http://{}",
        addr
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
