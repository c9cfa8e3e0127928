#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use devconf_a2a::{
    A2aServer, AgentCard, AgentExecutor, AgentOutput, AgentOutputStream, AgentSkill, Message,
    RequestContext,
};
use devconf_core::{DevconfError, Result};
use devconf_model::{ChatModel, ChatRequest, ChatResponse};
use devconf_orchestrator::api::create_app;
use devconf_orchestrator::prompts::GREETING_REPLY;
use devconf_orchestrator::{IntentRouter, OrchestratorConfig, RemoteAgents, Supervisor};
use devconf_session::SessionBackend;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const API: &str = "/api/devconf/v1";
pub const UNREACHABLE: &str = "http://127.0.0.1:1";
pub const REVIEWED_REPLY: &str = "Reviewed answer";

const QUERY_LINE: &str = "Current query (already translated to English):";

/// Routes on keywords in the query line of the routing prompt.
pub struct KeywordRouterModel;

#[async_trait]
impl ChatModel for KeywordRouterModel {
    fn name(&self) -> &str {
        "keyword-router"
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
        let prompt =
            request.messages.last().and_then(|m| m.content.clone()).unwrap_or_default();
        let query = prompt
            .lines()
            .find_map(|line| line.strip_prefix(QUERY_LINE))
            .unwrap_or_default()
            .trim()
            .to_string();

        let answer = if query.contains("GitHub") {
            r#"{"route": "github_agent", "reply": ""}"#.to_string()
        } else if query.contains("Google") {
            r#"{"route": "google_search_agent", "reply": ""}"#.to_string()
        } else {
            serde_json::json!({"route": "direct", "reply": GREETING_REPLY}).to_string()
        };
        Ok(ChatResponse::text(answer))
    }
}

pub struct FailingModel;

#[async_trait]
impl ChatModel for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse> {
        Err(DevconfError::Model("upstream returned 502".to_string()))
    }
}

/// Replaces every reply it reviews.
pub struct ReviewModel;

#[async_trait]
impl ChatModel for ReviewModel {
    fn name(&self) -> &str {
        "review"
    }

    async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse> {
        Ok(ChatResponse {
            reasoning: Some("checked tone".to_string()),
            ..ChatResponse::text(REVIEWED_REPLY)
        })
    }
}

/// Answers `Answer from <agent>: <query>` after one progress line and records
/// every message it receives.
pub struct CannedAgent {
    name: String,
    pub received: Arc<Mutex<Vec<Message>>>,
}

#[async_trait]
impl AgentExecutor for CannedAgent {
    async fn execute(&self, ctx: RequestContext) -> Result<AgentOutputStream> {
        if let Ok(mut received) = self.received.lock() {
            received.push(ctx.message.clone());
        }
        let query = ctx.message.typed_text("user_message").unwrap_or_default().to_string();
        let prefix = format!("Answer from {}: ", self.name);
        Ok(Box::pin(async_stream::stream! {
            yield Ok(AgentOutput::Progress("Running web_search...".to_string()));
            yield Ok(AgentOutput::TextChunk(prefix));
            yield Ok(AgentOutput::TextChunk(query));
        }))
    }
}

pub struct SpawnedAgent {
    pub url: String,
    pub received: Arc<Mutex<Vec<Message>>>,
}

impl SpawnedAgent {
    pub fn received(&self) -> Vec<Message> {
        self.received.lock().unwrap().clone()
    }
}

/// Serve a [`CannedAgent`] on an ephemeral port.
pub async fn spawn_agent(name: &str) -> SpawnedAgent {
    let received = Arc::new(Mutex::new(Vec::new()));
    let executor = Arc::new(CannedAgent { name: name.to_string(), received: received.clone() });
    let card = AgentCard::builder()
        .name(name)
        .description("Test agent")
        .url("http://localhost/a2a")
        .skills(vec![AgentSkill::new("search", "Search", "Answers questions", &["search"])])
        .build();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = A2aServer::new(card, executor).router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    SpawnedAgent { url: format!("http://{}", addr), received }
}

pub struct TestAppBuilder {
    google_url: String,
    github_url: String,
    model: Arc<dyn ChatModel>,
    postprocessor: Option<Arc<dyn ChatModel>>,
    backend: SessionBackend,
}

impl TestAppBuilder {
    pub fn new(google_url: &str, github_url: &str) -> Self {
        Self {
            google_url: google_url.to_string(),
            github_url: github_url.to_string(),
            model: Arc::new(KeywordRouterModel),
            postprocessor: None,
            backend: SessionBackend::in_memory(),
        }
    }

    pub fn model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.model = model;
        self
    }

    pub fn postprocessor(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.postprocessor = Some(model);
        self
    }

    pub fn backend(mut self, backend: SessionBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn build(self) -> Router {
        let config = OrchestratorConfig::default().with_agent_urls(&self.google_url, &self.github_url);
        let routes = config.agent_routes();
        let agents = RemoteAgents::from_routes(&routes, &config.a2a_client_config()).unwrap();
        let router = IntentRouter::new(self.model, routes);

        let mut supervisor = Supervisor::builder(self.backend.sessions.clone(), router, agents);
        if let Some(model) = self.postprocessor {
            supervisor = supervisor.postprocessor(model);
        }
        create_app(&config, supervisor.build(), self.backend)
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

pub async fn get_json(app: &Router, uri: &str, user: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).header("user-id", user).body(Body::empty()).unwrap();
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_str(&body).unwrap())
}

pub async fn post_json(app: &Router, uri: &str, user: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("user-id", user)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_str(&body).unwrap())
}

pub async fn create_conversation(app: &Router, user: &str) -> String {
    let (status, body) = post_json(app, &format!("{}/conversation", API), user, Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    body["conversation_id"].as_str().unwrap().to_string()
}

pub fn message_uri(conversation_id: &str) -> String {
    format!("{}/conversation/{}/message", API, conversation_id)
}

/// JSON payloads of every `data:` line in an SSE body.
pub fn sse_events(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}
