//! REST and SSE surface of the supervisor.
//!
//! Routes below the configured prefix (default `/api/devconf/v1`):
//!
//! | method | path | handler |
//! |---|---|---|
//! | POST | `/conversation` | create a conversation |
//! | POST | `/conversation/{id}/message` | send a message (SSE or JSON) |
//! | GET | `/meta/health` | liveness |
//! | GET | `/meta/status` | dependency status |
//! | GET | `/history` | recent conversations |
//! | GET | `/history/{id}` | one conversation with its turns |
//! | POST | `/feedback/conversation/{cid}/message/{mid}` | rate a reply |

pub mod controllers;
pub mod error;
pub mod middleware;
pub mod models;
pub mod user;

pub use controllers::{ConversationController, FeedbackController, HistoryController, MetaController};
pub use error::ApiError;
pub use user::CurrentUser;

use crate::config::OrchestratorConfig;
use crate::supervisor::Supervisor;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum::routing::{get, post};
use axum::{Router, middleware as axum_middleware};
use devconf_session::SessionBackend;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

fn build_cors_layer(config: &OrchestratorConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(user::USER_ID_HEADER),
        ]);

    if config.security.allowed_origins.is_empty() {
        cors.allow_origin(AllowOrigin::any())
    } else {
        let origins: Vec<HeaderValue> =
            config.security.allowed_origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(origins)
    }
}

/// The supervisor's HTTP application.
pub fn create_app(config: &OrchestratorConfig, supervisor: Supervisor, backend: SessionBackend) -> Router {
    let app_name = supervisor.app_name().to_string();
    let conversation_controller = ConversationController::new(
        supervisor.clone(),
        backend.sessions.clone(),
        config.security.expose_error_details,
    );
    let meta_controller = MetaController::new(supervisor, backend.sessions.clone());
    let history_controller = HistoryController::new(backend.sessions.clone(), app_name.clone());
    let feedback_controller =
        FeedbackController::new(backend.sessions, backend.feedback, app_name);

    let api_router = Router::new()
        .route("/conversation", post(controllers::conversation::create_conversation))
        .route(
            "/conversation/{conversation_id}/message",
            post(controllers::conversation::post_message),
        )
        .with_state(conversation_controller)
        .route("/meta/health", get(controllers::meta::health))
        .route("/meta/status", get(controllers::meta::status))
        .with_state(meta_controller)
        .route("/history", get(controllers::history::list_history))
        .route("/history/{conversation_id}", get(controllers::history::get_history))
        .with_state(history_controller)
        .route(
            "/feedback/conversation/{conversation_id}/message/{message_id}",
            post(controllers::feedback::submit_feedback),
        )
        .with_state(feedback_controller);

    let prefix = config.api_prefix.trim_end_matches('/');
    let app = if prefix.is_empty() {
        Router::new().merge(api_router)
    } else {
        Router::new().nest(prefix, api_router)
    };

    app.route("/health", get(health_check)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(axum_middleware::from_fn(middleware::log_client_ip))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                config.security.request_timeout,
            ))
            .layer(DefaultBodyLimit::max(config.security.max_body_size))
            .layer(build_cors_layer(config))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            )),
    )
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

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_error_never_triggers_shutdown() {
        let failed = async { Err(std::io::Error::other("no signal handler")) };
        let waited =
            tokio::time::timeout(Duration::from_millis(100), wait_for_shutdown(failed)).await;
        assert!(waited.is_err(), "shutdown resolved after a listener error");

        let received = async { Ok(()) };
        tokio::time::timeout(Duration::from_millis(100), wait_for_shutdown(received))
            .await
            .unwrap();
    }
}
