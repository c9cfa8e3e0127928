use anyhow::Result;
use clap::Parser;
use devconf_agents::{AgentKind, AgentServiceConfig, run_agent_server};

/// Web search agent served over A2A.
#[derive(Parser)]
#[command(name = "google-search-agent", version, about)]
struct Cli {
    /// Interface to bind (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides PORT, default 8001)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = devconf_telemetry::init_telemetry(AgentKind::GoogleSearch.service_name()) {
        eprintln!("Failed to initialize telemetry: {}", e);
    }

    let mut config = AgentServiceConfig::from_env(AgentKind::GoogleSearch)?;
    if let Some(host) = cli.host {
        config = config.with_host(host);
    }
    if let Some(port) = cli.port {
        config = config.with_port(port);
    }

    run_agent_server(config).await
}
