use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use devconf_a2a::*;
use devconf_core::{DevconfError, Result};
use futures::StreamExt;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tower::ServiceExt;

/// Echoes the user_message part back in two chunks after one progress line.
struct EchoExecutor;

#[async_trait]
impl AgentExecutor for EchoExecutor {
    async fn execute(&self, ctx: RequestContext) -> Result<AgentOutputStream> {
        let text = ctx
            .message
            .typed_text("user_message")
            .map(str::to_string)
            .unwrap_or_else(|| ctx.message.text_content());
        Ok(Box::pin(async_stream::stream! {
            yield Ok(AgentOutput::Progress("Searching Google...".to_string()));
            yield Ok(AgentOutput::TextChunk("echo: ".to_string()));
            yield Ok(AgentOutput::TextChunk(text));
        }))
    }
}

/// Never finishes on its own; only cancellation ends it.
struct StuckExecutor;

#[async_trait]
impl AgentExecutor for StuckExecutor {
    async fn execute(&self, ctx: RequestContext) -> Result<AgentOutputStream> {
        Ok(Box::pin(async_stream::stream! {
            yield Ok(AgentOutput::TextChunk("partial".to_string()));
            ctx.cancel.cancelled().await;
        }))
    }
}

struct FailingExecutor;

#[async_trait]
impl AgentExecutor for FailingExecutor {
    async fn execute(&self, _ctx: RequestContext) -> Result<AgentOutputStream> {
        Err(DevconfError::Model("upstream LLM returned 500".to_string()))
    }
}

fn card() -> AgentCard {
    AgentCard::builder()
        .name("google_search_agent")
        .description("Web search agent")
        .url("http://localhost:8001/a2a")
        .skills(vec![AgentSkill::new("web_search", "Web search", "Searches the web", &["search"])])
        .build()
}

fn app(executor: Arc<dyn AgentExecutor>) -> axum::Router {
    A2aServer::new(card(), executor).router()
}

async fn post_json(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn send_request(text: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "message/send",
        "params": {
            "message": {
                "role": "user",
                "messageId": "m1",
                "parts": [{"kind": "text", "text": text, "metadata": {"type": "user_message"}}]
            }
        }
    })
}

async fn spawn_server(executor: Arc<dyn AgentExecutor>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(executor)).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_agent_card_endpoints() {
    for uri in ["/.well-known/agent.json", "/.well-known/agent-card.json"] {
        let response = app(Arc::new(EchoExecutor))
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let card: AgentCard = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(card.name, "google_search_agent");
        assert_eq!(card.protocol_version, "0.3.0");
        assert_eq!(card.skills[0].id, "web_search");
    }
}

#[tokio::test]
async fn test_message_send_returns_completed_task() {
    let (status, body) =
        post_json(app(Arc::new(EchoExecutor)), "/a2a", send_request("latest rust release")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 1);
    let task: Task = serde_json::from_value(body["result"].clone()).unwrap();
    assert_eq!(task.status.state, TaskState::Completed);
    assert_eq!(reply_text(&task).unwrap(), "echo: latest rust release");
}

#[tokio::test]
async fn test_message_send_failure_is_sanitized() {
    let (_, body) = post_json(app(Arc::new(FailingExecutor)), "/a2a", send_request("hi")).await;

    let task: Task = serde_json::from_value(body["result"].clone()).unwrap();
    assert_eq!(task.status.state, TaskState::Failed);
    assert_eq!(task.status.message.as_deref(), Some("Internal server error"));
    assert!(task.artifacts.is_empty());
}

#[tokio::test]
async fn test_jsonrpc_errors() {
    let router = app(Arc::new(EchoExecutor));

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/a2a")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], -32700);

    let (_, body) = post_json(
        router.clone(),
        "/a2a",
        json!({"jsonrpc": "1.0", "id": 2, "method": "message/send"}),
    )
    .await;
    assert_eq!(body["error"]["code"], -32600);
    assert_eq!(body["id"], 2);

    let (_, body) =
        post_json(router.clone(), "/a2a", json!({"jsonrpc": "2.0", "id": 3, "method": "agents/list"}))
            .await;
    assert_eq!(body["error"]["code"], -32601);

    let (_, body) =
        post_json(router.clone(), "/a2a", json!({"jsonrpc": "2.0", "id": 4, "method": "message/send"}))
            .await;
    assert_eq!(body["error"]["code"], -32602);

    let (_, body) = post_json(
        router,
        "/a2a",
        json!({"jsonrpc": "2.0", "id": 5, "method": "tasks/get", "params": {"id": "nope"}}),
    )
    .await;
    assert_eq!(body["error"]["code"], -32001);
}

#[tokio::test]
async fn test_tasks_get_after_send() {
    let base_url = spawn_server(Arc::new(EchoExecutor)).await;
    let client = A2aClient::new(&base_url, &A2aClientConfig::default()).unwrap();

    let message = Message::builder()
        .task_id("task-42")
        .part(Part::typed_text("axum", "user_message"))
        .build();
    let task = client.send_message(message).await.unwrap();
    assert_eq!(task.id, "task-42");

    let stored = client.get_task("task-42").await.unwrap();
    assert_eq!(stored, task);

    let err = client.cancel_task("task-42").await.unwrap_err();
    assert!(matches!(err, DevconfError::A2a(m) if m.contains("-32002")));
}

#[tokio::test]
async fn test_streaming_message_yields_progress_then_chunks() {
    let base_url = spawn_server(Arc::new(EchoExecutor)).await;
    let client = A2aClient::new(&base_url, &A2aClientConfig::default()).unwrap();

    let card = client.resolve_agent_card().await.unwrap();
    assert!(card.capabilities.streaming);

    let message = Message::builder().part(Part::typed_text("tokio", "user_message")).build();
    let events: Vec<UpdateEvent> = client
        .send_streaming_message(message.clone())
        .await
        .unwrap()
        .map(|e| e.unwrap())
        .collect()
        .await;

    let UpdateEvent::TaskStatusUpdate(last) = events.last().unwrap() else {
        panic!("stream must end with a status update");
    };
    assert!(last.final_update);
    assert_eq!(last.status.state, TaskState::Completed);

    let appends: Vec<bool> = events
        .iter()
        .filter_map(|e| match e {
            UpdateEvent::TaskArtifactUpdate(a) => Some(a.append),
            _ => None,
        })
        .collect();
    assert_eq!(appends, vec![false, true]);

    let outputs: Vec<AgentOutput> =
        client.stream_reply(message).await.unwrap().map(|o| o.unwrap()).collect().await;
    assert_eq!(
        outputs,
        vec![
            AgentOutput::Progress("Searching Google...".to_string()),
            AgentOutput::TextChunk("echo: ".to_string()),
            AgentOutput::TextChunk("tokio".to_string()),
        ]
    );
}

/// Answer one request with an SSE body written in the given chunks.
async fn serve_sse_in_chunks(chunks: Vec<Vec<u8>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        let body_start = loop {
            let n = socket.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
            if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&request[..body_start]).to_lowercase();
        let content_length: usize = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .map(|v| v.trim().parse().unwrap())
            .unwrap_or(0);
        while request.len() - body_start < content_length {
            let n = socket.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
        }

        socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n")
            .await
            .unwrap();
        for chunk in chunks {
            socket.write_all(&chunk).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_streaming_keeps_multibyte_char_split_across_reads() {
    let update = UpdateEvent::TaskArtifactUpdate(TaskArtifactUpdateEvent {
        task_id: "t1".to_string(),
        context_id: None,
        artifact: Artifact::text("a1", "café"),
        append: false,
        last_chunk: false,
    });
    let frame = JsonRpcResponse::success(Some(json!(1)), serde_json::to_value(update).unwrap());
    let body = format!("data: {}\n\n", serde_json::to_string(&frame).unwrap()).into_bytes();
    // Split between the two bytes of 'é'.
    let split = body.iter().position(|&b| b == 0xC3).unwrap() + 1;
    let base_url = serve_sse_in_chunks(vec![body[..split].to_vec(), body[split..].to_vec()]).await;

    let client = A2aClient::new(&base_url, &A2aClientConfig::default()).unwrap();
    let message = Message::builder().part(Part::text("coffee")).build();
    let outputs: Vec<AgentOutput> =
        client.stream_reply(message).await.unwrap().map(|o| o.unwrap()).collect().await;

    assert_eq!(outputs, vec![AgentOutput::TextChunk("café".to_string())]);
}

#[tokio::test]
async fn test_cancel_stops_running_task() {
    let base_url = spawn_server(Arc::new(StuckExecutor)).await;
    let client = A2aClient::new(&base_url, &A2aClientConfig::default()).unwrap();

    let sender = client.clone();
    let send = tokio::spawn(async move {
        let message = Message::builder().task_id("slow-task").part(Part::text("wait")).build();
        sender.send_message(message).await
    });

    let mut registered = false;
    for _ in 0..50 {
        if let Ok(task) = client.get_task("slow-task").await {
            assert_eq!(task.status.state, TaskState::Working);
            registered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(registered, "task never registered");

    let canceled = client.cancel_task("slow-task").await.unwrap();
    assert_eq!(canceled.status.state, TaskState::Canceled);

    let finished = send.await.unwrap().unwrap();
    assert_eq!(finished.status.state, TaskState::Canceled);
    assert!(reply_text(&finished).is_err());
}

#[tokio::test]
async fn test_unreachable_agent_is_dependency_unavailable() {
    let config = A2aClientConfig { connect_timeout: Duration::from_millis(500), ..Default::default() };
    let client = A2aClient::new("http://127.0.0.1:1", &config).unwrap();

    let err = client.send_message(Message::builder().part(Part::text("hi")).build()).await.unwrap_err();
    assert!(matches!(err, DevconfError::DependencyUnavailable(_)));

    let err = client.resolve_agent_card().await.unwrap_err();
    assert!(matches!(err, DevconfError::DependencyUnavailable(_)));
}
