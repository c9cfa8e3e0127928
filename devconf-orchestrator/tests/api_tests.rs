mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use devconf_orchestrator::prompts::GREETING_REPLY;
use serde_json::{Value, json};
use std::sync::Arc;

const USER: &str = "user-1";

async fn ask(app: &axum::Router, conversation_id: &str, input: &str) -> (StatusCode, Value) {
    post_json(app, &message_uri(conversation_id), USER, json!({"input": input, "stream": false})).await
}

async fn ask_streaming(
    app: &axum::Router,
    conversation_id: &str,
    input: &str,
) -> (StatusCode, axum::http::HeaderMap, Vec<Value>) {
    let request = Request::builder()
        .method("POST")
        .uri(message_uri(conversation_id))
        .header("user-id", USER)
        .header("content-type", "application/json")
        .body(Body::from(json!({"input": input}).to_string()))
        .unwrap();
    let (status, headers, body) = send(app, request).await;
    (status, headers, sse_events(&body))
}

#[tokio::test]
async fn test_create_conversation_uses_user_header() {
    let app = TestAppBuilder::new(UNREACHABLE, UNREACHABLE).build();

    let (status, body) = post_json(&app, &format!("{}/conversation", API), USER, Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], USER);
    assert_eq!(body["app_name"], "devconf_multi_agent");
    assert!(!body["conversation_id"].as_str().unwrap().is_empty());

    let request = Request::builder()
        .method("POST")
        .uri(format!("{}/conversation", API))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["user_id"], "test-user-id");
}

#[tokio::test]
async fn test_collected_reply_from_google_agent() {
    let google = spawn_agent("google_search_agent").await;
    let app = TestAppBuilder::new(&google.url, UNREACHABLE).build();
    let conversation_id = create_conversation(&app, USER).await;

    let (status, body) = ask(&app, &conversation_id, "Google the latest Rust release").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["done"], true);
    assert_eq!(body["conversation_id"], conversation_id.as_str());
    assert_eq!(body["user_id"], USER);
    assert_eq!(
        body["content"],
        "Answer from google_search_agent: Google the latest Rust release"
    );
    assert!(body["message_id"].as_str().is_some());

    let received = google.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].context_id.as_deref(), Some(conversation_id.as_str()));
    assert_eq!(received[0].typed_text("context"), None);
}

#[tokio::test]
async fn test_github_phrasing_routes_to_github_agent() {
    let google = spawn_agent("google_search_agent").await;
    let github = spawn_agent("github_agent").await;
    let app = TestAppBuilder::new(&google.url, &github.url).build();
    let conversation_id = create_conversation(&app, USER).await;

    let (status, body) = ask(&app, &conversation_id, "How many stars does tokio have on GitHub?").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["content"],
        "Answer from github_agent: How many stars does tokio have on GitHub?"
    );
    assert!(google.received().is_empty());
    assert_eq!(github.received().len(), 1);
}

#[tokio::test]
async fn test_greeting_is_answered_directly() {
    let google = spawn_agent("google_search_agent").await;
    let app = TestAppBuilder::new(&google.url, UNREACHABLE).build();
    let conversation_id = create_conversation(&app, USER).await;

    let (status, body) = ask(&app, &conversation_id, "Hi there").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], GREETING_REPLY);
    assert!(google.received().is_empty());

    let (_, _, events) = ask_streaming(&app, &conversation_id, "Hello again").await;
    let content = events.iter().find(|e| e["event_type"] == "content").unwrap();
    assert_eq!(content["author"], "supervisor_agent");
    assert_eq!(content["is_final"], true);
}

#[tokio::test]
async fn test_second_message_forwards_context() {
    let google = spawn_agent("google_search_agent").await;
    let app = TestAppBuilder::new(&google.url, UNREACHABLE).build();
    let conversation_id = create_conversation(&app, USER).await;

    ask(&app, &conversation_id, "Google axum middleware").await;
    ask(&app, &conversation_id, "Google its latest version").await;

    let received = google.received();
    assert_eq!(received.len(), 2);
    let context = received[1].typed_text("context").unwrap();
    assert!(context.starts_with("For context:"));
    assert!(context.contains("User previously asked: Google axum middleware"));
    assert!(context.contains("[google_search_agent] replied: Answer from google_search_agent"));
    assert_eq!(received[1].typed_text("user_message"), Some("Google its latest version"));
}

#[tokio::test]
async fn test_unknown_or_foreign_conversation_is_not_found() {
    let app = TestAppBuilder::new(UNREACHABLE, UNREACHABLE).build();

    let (status, body) = ask(&app, "missing", "Google something").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Conversation not found: missing");

    let conversation_id = create_conversation(&app, "someone-else").await;
    let (status, body) = ask(&app, &conversation_id, "Google something").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], format!("Conversation not found: {}", conversation_id));
}

#[tokio::test]
async fn test_invalid_message_bodies() {
    let app = TestAppBuilder::new(UNREACHABLE, UNREACHABLE).build();
    let conversation_id = create_conversation(&app, USER).await;

    let (status, body) = ask(&app, &conversation_id, "   ").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"], "Input cannot be empty.");

    let (status, body) = post_json(&app, &message_uri(&conversation_id), USER, json!({"stream": false})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_unreachable_agent_is_service_unavailable() {
    let app = TestAppBuilder::new(UNREACHABLE, UNREACHABLE).build();
    let conversation_id = create_conversation(&app, USER).await;

    let (status, body) = ask(&app, &conversation_id, "Google tokio").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["detail"], "Remote agent unavailable: google_search_agent");
}

#[tokio::test]
async fn test_disabled_agent_is_service_unavailable() {
    let google = spawn_agent("google_search_agent").await;
    let app = TestAppBuilder::new(&google.url, "").build();
    let conversation_id = create_conversation(&app, USER).await;

    let (status, body) = ask(&app, &conversation_id, "GitHub issues for serde").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["detail"], "Remote agent unavailable: github_agent");
}

#[tokio::test]
async fn test_routing_failure_is_internal_error() {
    let google = spawn_agent("google_search_agent").await;
    let app = TestAppBuilder::new(&google.url, UNREACHABLE).model(Arc::new(FailingModel)).build();
    let conversation_id = create_conversation(&app, USER).await;

    let (status, body) = ask(&app, &conversation_id, "Google tokio").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "AI assistant is not able to process the message");
    assert!(google.received().is_empty());
}

#[tokio::test]
async fn test_streaming_event_order() {
    let google = spawn_agent("google_search_agent").await;
    let app = TestAppBuilder::new(&google.url, UNREACHABLE).build();
    let conversation_id = create_conversation(&app, USER).await;

    let (status, headers, events) = ask_streaming(&app, &conversation_id, "Google tower layers").await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers["content-type"].to_str().unwrap().starts_with("text/event-stream"));
    assert_eq!(headers["cache-control"], "no-cache");
    assert_eq!(headers["x-accel-buffering"], "no");

    let kinds: Vec<&str> = events.iter().map(|e| e["event_type"].as_str().unwrap()).collect();
    assert_eq!(kinds, vec!["progress", "progress", "progress", "content", "content", "done"]);

    assert_eq!(events[0]["author"], "supervisor_agent");
    assert_eq!(events[0]["progress_message"], "Routing your question...");
    assert_eq!(events[1]["author"], "google_search_agent");
    assert_eq!(events[1]["progress_message"], "Searching Google...");
    assert_eq!(events[2]["progress_message"], "Running web_search...");
    assert_eq!(events[3]["content"], "Answer from google_search_agent: ");
    assert_eq!(events[3]["is_final"], false);
    assert_eq!(events[4]["content"], "Google tower layers");
    assert_eq!(events[5]["done"], true);

    let message_id = events[0]["message_id"].as_str().unwrap();
    for event in &events {
        assert_eq!(event["conversation_id"], conversation_id.as_str());
        assert_eq!(event["message_id"], message_id);
    }
}

#[tokio::test]
async fn test_streaming_emits_reviewed_final_content() {
    let google = spawn_agent("google_search_agent").await;
    let app = TestAppBuilder::new(&google.url, UNREACHABLE).postprocessor(Arc::new(ReviewModel)).build();
    let conversation_id = create_conversation(&app, USER).await;

    let (_, _, events) = ask_streaming(&app, &conversation_id, "Google tower layers").await;
    let finals: Vec<&Value> =
        events.iter().filter(|e| e["event_type"] == "content" && e["is_final"] == true).collect();
    assert_eq!(finals.len(), 1);
    assert_eq!(finals[0]["content"], REVIEWED_REPLY);
    assert_eq!(finals[0]["thinking"], "checked tone");
    assert_eq!(events.last().unwrap()["event_type"], "done");
}

#[tokio::test]
async fn test_streaming_error_event() {
    let app = TestAppBuilder::new(UNREACHABLE, UNREACHABLE).build();
    let conversation_id = create_conversation(&app, USER).await;

    let (status, _, events) = ask_streaming(&app, &conversation_id, "Google tokio").await;
    assert_eq!(status, StatusCode::OK);
    let last = events.last().unwrap();
    assert_eq!(last["event_type"], "error");
    assert_eq!(last["error"], "Remote agent unavailable: google_search_agent");
    assert_eq!(last["conversation_id"], conversation_id.as_str());
}

#[tokio::test]
async fn test_meta_health_and_status() {
    let google = spawn_agent("google_search_agent").await;
    let app = TestAppBuilder::new(&google.url, "").build();

    let (status, body) = get_json(&app, &format!("{}/meta/health", API), USER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "OK"}));

    let (status, body) = get_json(&app, &format!("{}/meta/status", API), USER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["services"]["supervisor-agent"]["status"], "OK");
    assert_eq!(body["services"]["session-service"]["status"], "OK");
    assert_eq!(body["services"]["google-search-agent"]["status"], "OK");
    assert_eq!(body["services"]["github-agent"]["status"], "Disabled");

    let app = TestAppBuilder::new(UNREACHABLE, "").build();
    let (status, body) = get_json(&app, &format!("{}/meta/status", API), USER).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["services"]["google-search-agent"]["status"], "Down");

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, headers, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
    assert_eq!(headers["x-content-type-options"], "nosniff");
}

#[tokio::test]
async fn test_history_requires_database() {
    let app = TestAppBuilder::new(UNREACHABLE, UNREACHABLE).build();
    let (status, body) = get_json(&app, &format!("{}/history", API), USER).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["detail"],
        "History feature not available. Database storage is not enabled."
    );
}

#[cfg(feature = "database")]
#[tokio::test]
async fn test_history_with_database() {
    use devconf_session::{SessionBackend, StorageConfig};

    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("devconf.db").display());
    let backend = SessionBackend::open(&StorageConfig::Database { url }).await.unwrap();

    let google = spawn_agent("google_search_agent").await;
    let app = TestAppBuilder::new(&google.url, UNREACHABLE).backend(backend).build();
    let conversation_id = create_conversation(&app, USER).await;
    ask(&app, &conversation_id, "Google sqlx migrations").await;
    ask(&app, &conversation_id, "Hi").await;
    create_conversation(&app, "someone-else").await;

    let (status, body) = get_json(&app, &format!("{}/history", API), USER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 1);
    assert_eq!(body["sessions"][0]["conversation_id"], conversation_id.as_str());
    assert_eq!(body["sessions"][0]["title"], "Google sqlx migrations");

    let (status, body) = get_json(&app, &format!("{}/history/{}", API, conversation_id), USER).await;
    assert_eq!(status, StatusCode::OK);
    let turns = body["turns"].as_array().unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0]["question"], "Google sqlx migrations");
    assert_eq!(turns[0]["answer"], "Answer from google_search_agent: Google sqlx migrations");
    assert_eq!(turns[1]["answer"], GREETING_REPLY);

    let (status, _) = get_json(&app, &format!("{}/history?limit=0", API), USER).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = get_json(&app, &format!("{}/history?limit=51", API), USER).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = get_json(&app, &format!("{}/history/missing", API), USER).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Conversation not found: missing");
}

#[cfg(feature = "database")]
#[tokio::test]
async fn test_history_malformed_limit_is_json_error() {
    use devconf_session::{SessionBackend, StorageConfig};

    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("devconf.db").display());
    let backend = SessionBackend::open(&StorageConfig::Database { url }).await.unwrap();
    let app = TestAppBuilder::new(UNREACHABLE, UNREACHABLE).backend(backend).build();

    let request = Request::builder()
        .uri(format!("{}/history?limit=abc", API))
        .header("user-id", USER)
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(headers["content-type"], "application/json");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert!(body["detail"].as_str().unwrap().contains("limit"), "{}", body);
}

#[tokio::test]
async fn test_feedback_upsert() {
    let google = spawn_agent("google_search_agent").await;
    let app = TestAppBuilder::new(&google.url, UNREACHABLE).build();
    let conversation_id = create_conversation(&app, USER).await;
    let (_, reply) = ask(&app, &conversation_id, "Google serde derive").await;
    let message_id = reply["message_id"].as_str().unwrap();
    let uri = format!("{}/feedback/conversation/{}/message/{}", API, conversation_id, message_id);

    let (status, first) = post_json(&app, &uri, USER, json!({"feedback_type": "positive"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["source_agent"], "google_search_agent");
    assert_eq!(first["feedback_type"], "positive");
    assert_eq!(first["user_id"], USER);

    let (status, second) = post_json(
        &app,
        &uri,
        USER,
        json!({"feedback_type": "negative", "comment": "  outdated  ", "predefined_response": "Not accurate"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["feedback_id"], first["feedback_id"]);
    assert_eq!(second["feedback_type"], "negative");
    assert_eq!(second["comment"], "outdated");

    let (status, body) = post_json(
        &app,
        &format!("{}/feedback/conversation/{}/message/nope", API, conversation_id),
        USER,
        json!({"feedback_type": "positive"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Message not found: nope");

    let (status, _) =
        post_json(&app, &uri, USER, json!({"feedback_type": "negative", "comment": "x".repeat(1001)})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
