use devconf_agents::github::{GithubClient, github_tools};
use devconf_agents::tool::Tool;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn tool(server: &MockServer, name: &str) -> Arc<dyn Tool> {
    let client = GithubClient::with_base_url("test-token", &server.uri()).unwrap();
    github_tools(client).into_iter().find(|t| t.name() == name).unwrap()
}

#[tokio::test]
async fn test_tool_set_order() {
    let server = MockServer::start().await;
    let client = GithubClient::with_base_url("test-token", &server.uri()).unwrap();
    let names: Vec<String> = github_tools(client).iter().map(|t| t.name().to_string()).collect();
    assert_eq!(
        names,
        vec![
            "get_repository_info",
            "get_repository_languages",
            "get_repository_contributors",
            "get_repository_issues",
            "get_repository_pulls",
            "get_repository_releases",
            "search_repositories",
        ]
    );
}

#[tokio::test]
async fn test_repository_info_sends_token_and_shapes_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/tokio-rs/axum"))
        .and(header("authorization", "token test-token"))
        .and(header("accept", "application/vnd.github.v3+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "axum",
            "full_name": "tokio-rs/axum",
            "description": "Ergonomic and modular web framework",
            "language": "Rust",
            "stargazers_count": 20000,
            "forks_count": 1000,
            "open_issues_count": 50,
            "default_branch": "main",
            "topics": ["http", "web"],
            "license": {"name": "MIT License"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = tool(&server, "get_repository_info")
        .execute(json!({"owner": "tokio-rs", "repo": "axum"}))
        .await
        .unwrap();

    assert_eq!(result["full_name"], "tokio-rs/axum");
    assert_eq!(result["stars"], 20000);
    assert_eq!(result["license"], "MIT License");
    assert_eq!(result["topics"], json!(["http", "web"]));
    assert!(result["homepage"].is_null());
}

#[tokio::test]
async fn test_issues_passes_state_and_clamps_page_size() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/rust-lang/rust/issues"))
        .and(query_param("state", "closed"))
        .and(query_param("per_page", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"number": 10, "title": "ICE on nightly", "state": "closed", "user": {"login": "bob"}, "labels": [], "assignees": []},
            {"number": 11, "title": "Add lint", "state": "closed", "pull_request": {"url": "x"}}
        ])))
        .mount(&server)
        .await;

    let result = tool(&server, "get_repository_issues")
        .execute(json!({"owner": "rust-lang", "repo": "rust", "state": "closed", "per_page": 500}))
        .await
        .unwrap();

    let issues = result.as_array().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0]["number"], 10);
    assert_eq!(issues[0]["author"], "bob");
}

#[tokio::test]
async fn test_search_repositories_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("q", "web framework language:rust"))
        .and(query_param("sort", "stars"))
        .and(query_param("order", "desc"))
        .and(query_param("per_page", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 1,
            "incomplete_results": false,
            "items": [{"name": "actix-web", "full_name": "actix/actix-web", "stargazers_count": 21000}]
        })))
        .mount(&server)
        .await;

    let result = tool(&server, "search_repositories")
        .execute(json!({"query": "web framework language:rust"}))
        .await
        .unwrap();

    assert_eq!(result["total_count"], 1);
    assert_eq!(result["repositories"][0]["full_name"], "actix/actix-web");
    assert_eq!(result["repositories"][0]["stars"], 21000);
}

#[tokio::test]
async fn test_not_found_becomes_error_with_context() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/nobody/nothing/languages"))
        .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"message":"Not Found"}"#))
        .mount(&server)
        .await;

    let err = tool(&server, "get_repository_languages")
        .execute(json!({"owner": "nobody", "repo": "nothing"}))
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("Error getting languages for nobody/nothing"), "{}", message);
    assert!(message.contains("404"), "{}", message);
}

#[tokio::test]
async fn test_missing_owner_is_rejected_without_request() {
    let server = MockServer::start().await;
    let err = tool(&server, "get_repository_releases").execute(json!({"repo": "axum"})).await.unwrap_err();
    assert!(err.to_string().contains("owner"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_path_traversal_is_rejected_without_request() {
    let server = MockServer::start().await;
    for (owner, repo) in [("octocat", "../../user"), ("..", "repos"), ("octocat", "hello?per_page=100")] {
        let err = tool(&server, "get_repository_info")
            .execute(json!({"owner": owner, "repo": repo}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid"), "{}", err);
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}
