use crate::remote::RemoteAgent;
use crate::supervisor::Supervisor;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use devconf_core::Intent;
use devconf_session::SessionStore;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ServiceStatus {
    #[serde(rename = "OK")]
    Ok,
    Down,
    Disabled,
}

#[derive(Clone)]
pub struct MetaController {
    supervisor: Supervisor,
    sessions: Arc<dyn SessionStore>,
}

impl MetaController {
    pub fn new(supervisor: Supervisor, sessions: Arc<dyn SessionStore>) -> Self {
        Self { supervisor, sessions }
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}

async fn agent_status(agent: Option<&RemoteAgent>) -> ServiceStatus {
    let Some(agent) = agent else {
        return ServiceStatus::Disabled;
    };
    match agent.check().await {
        Ok(()) => ServiceStatus::Ok,
        Err(e) => {
            tracing::warn!(agent = %agent.name(), error = %e, "agent status check failed");
            ServiceStatus::Down
        }
    }
}

/// Reachability of the supervisor's dependencies. 503 when any is down.
pub async fn status(State(controller): State<MetaController>) -> (StatusCode, Json<Value>) {
    let agents = controller.supervisor.agents();
    let (session, google, github) = tokio::join!(
        controller.sessions.health_check(),
        agent_status(agents.get(Intent::GoogleSearch)),
        agent_status(agents.get(Intent::GithubSearch)),
    );
    let session = match session {
        Ok(()) => ServiceStatus::Ok,
        Err(e) => {
            tracing::warn!(error = %e, "session store health check failed");
            ServiceStatus::Down
        }
    };

    let statuses = [
        ("supervisor-agent", ServiceStatus::Ok),
        ("session-service", session),
        ("google-search-agent", google),
        ("github-agent", github),
    ];
    let code = if statuses.iter().any(|(_, s)| *s == ServiceStatus::Down) {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    let services: Map<String, Value> = statuses
        .into_iter()
        .map(|(name, status)| (name.to_string(), json!({ "status": status })))
        .collect();

    (code, Json(json!({ "services": services })))
}
