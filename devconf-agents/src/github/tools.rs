use super::GithubClient;
use crate::tool::{FunctionTool, Tool, args};
use devconf_core::{DevconfError, Result};
use serde_json::{Value, json};
use std::sync::Arc;

const RELEASE_BODY_LIMIT: usize = 500;

fn field(value: &Value, pointer: &str) -> Value {
    value.pointer(pointer).cloned().unwrap_or(Value::Null)
}

fn items(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or_default()
}

fn names(value: &Value, list: &str, key: &str) -> Value {
    items(&field(value, list))
        .iter()
        .filter_map(|item| item.get(key).cloned())
        .collect::<Vec<_>>()
        .into()
}

fn license_name(value: &Value) -> Value {
    field(value, "/license/name")
}

pub fn repository_info(data: &Value) -> Value {
    json!({
        "name": field(data, "/name"),
        "full_name": field(data, "/full_name"),
        "description": field(data, "/description"),
        "language": field(data, "/language"),
        "stars": field(data, "/stargazers_count"),
        "forks": field(data, "/forks_count"),
        "open_issues": field(data, "/open_issues_count"),
        "created_at": field(data, "/created_at"),
        "updated_at": field(data, "/updated_at"),
        "size": field(data, "/size"),
        "default_branch": field(data, "/default_branch"),
        "topics": data.get("topics").cloned().unwrap_or_else(|| json!([])),
        "license": license_name(data),
        "homepage": field(data, "/homepage"),
        "clone_url": field(data, "/clone_url"),
        "ssh_url": field(data, "/ssh_url"),
    })
}

/// Languages with byte counts and percentages, largest first.
pub fn language_breakdown(data: &Value) -> Value {
    let mut languages: Vec<(String, u64)> = data
        .as_object()
        .map(|map| map.iter().map(|(k, v)| (k.clone(), v.as_u64().unwrap_or(0))).collect())
        .unwrap_or_default();
    languages.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let total: u64 = languages.iter().map(|(_, bytes)| bytes).sum();
    languages
        .into_iter()
        .map(|(language, bytes)| {
            let percentage = if total > 0 { bytes as f64 / total as f64 * 100.0 } else { 0.0 };
            json!({
                "language": language,
                "bytes": bytes,
                "percentage": (percentage * 100.0).round() / 100.0,
            })
        })
        .collect::<Vec<_>>()
        .into()
}

pub fn contributors(data: &Value) -> Value {
    items(data)
        .iter()
        .map(|c| {
            json!({
                "login": field(c, "/login"),
                "contributions": field(c, "/contributions"),
                "type": field(c, "/type"),
                "profile_url": field(c, "/html_url"),
            })
        })
        .collect::<Vec<_>>()
        .into()
}

/// The issues endpoint also lists pull requests; those are dropped.
pub fn issues(data: &Value) -> Value {
    items(data)
        .iter()
        .filter(|issue| issue.get("pull_request").is_none_or(Value::is_null))
        .map(|issue| {
            json!({
                "number": field(issue, "/number"),
                "title": field(issue, "/title"),
                "state": field(issue, "/state"),
                "created_at": field(issue, "/created_at"),
                "updated_at": field(issue, "/updated_at"),
                "labels": names(issue, "/labels", "name"),
                "assignees": names(issue, "/assignees", "login"),
                "comments": field(issue, "/comments"),
                "author": field(issue, "/user/login"),
                "url": field(issue, "/html_url"),
            })
        })
        .collect::<Vec<_>>()
        .into()
}

pub fn pulls(data: &Value) -> Value {
    items(data)
        .iter()
        .map(|pr| {
            json!({
                "number": field(pr, "/number"),
                "title": field(pr, "/title"),
                "state": field(pr, "/state"),
                "created_at": field(pr, "/created_at"),
                "updated_at": field(pr, "/updated_at"),
                "merged_at": field(pr, "/merged_at"),
                "author": field(pr, "/user/login"),
                "base_branch": field(pr, "/base/ref"),
                "head_branch": field(pr, "/head/ref"),
                "additions": field(pr, "/additions"),
                "deletions": field(pr, "/deletions"),
                "changed_files": field(pr, "/changed_files"),
                "comments": field(pr, "/comments"),
                "review_comments": field(pr, "/review_comments"),
                "url": field(pr, "/html_url"),
            })
        })
        .collect::<Vec<_>>()
        .into()
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() > RELEASE_BODY_LIMIT {
        let head: String = body.chars().take(RELEASE_BODY_LIMIT).collect();
        format!("{}...", head)
    } else {
        body.to_string()
    }
}

pub fn releases(data: &Value) -> Value {
    items(data)
        .iter()
        .map(|release| {
            json!({
                "name": field(release, "/name"),
                "tag_name": field(release, "/tag_name"),
                "published_at": field(release, "/published_at"),
                "created_at": field(release, "/created_at"),
                "author": field(release, "/author/login"),
                "prerelease": field(release, "/prerelease"),
                "draft": field(release, "/draft"),
                "assets_count": items(&field(release, "/assets")).len(),
                "body": truncate_body(release.get("body").and_then(Value::as_str).unwrap_or_default()),
                "url": field(release, "/html_url"),
            })
        })
        .collect::<Vec<_>>()
        .into()
}

pub fn search_results(data: &Value) -> Value {
    let repositories: Vec<Value> = items(&field(data, "/items"))
        .iter()
        .map(|repo| {
            json!({
                "name": field(repo, "/name"),
                "full_name": field(repo, "/full_name"),
                "description": field(repo, "/description"),
                "language": field(repo, "/language"),
                "stars": field(repo, "/stargazers_count"),
                "forks": field(repo, "/forks_count"),
                "open_issues": field(repo, "/open_issues_count"),
                "created_at": field(repo, "/created_at"),
                "updated_at": field(repo, "/updated_at"),
                "topics": repo.get("topics").cloned().unwrap_or_else(|| json!([])),
                "license": license_name(repo),
                "url": field(repo, "/html_url"),
            })
        })
        .collect();

    json!({
        "total_count": field(data, "/total_count"),
        "incomplete_results": field(data, "/incomplete_results"),
        "repositories": repositories,
    })
}

fn repo_schema(extra: Value) -> Value {
    let mut properties = json!({
        "owner": {"type": "string", "description": "Repository owner (username or organization)"},
        "repo": {"type": "string", "description": "Repository name"},
    });
    if let (Some(props), Some(extra)) = (properties.as_object_mut(), extra.as_object()) {
        props.extend(extra.clone());
    }
    json!({"type": "object", "properties": properties, "required": ["owner", "repo"]})
}

fn owner_repo(input: &Value) -> Result<(String, String)> {
    Ok((path_segment(input, "owner")?, path_segment(input, "repo")?))
}

/// An owner or repository name that is safe to splice into a `repos/` path.
fn path_segment(input: &Value, key: &str) -> Result<String> {
    let value = args::required_str(input, key)?;
    let valid = value != "."
        && value != ".."
        && value.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(DevconfError::Validation(format!("invalid `{}`: {:?}", key, value)));
    }
    Ok(value.to_string())
}

fn context(what: &str, owner: &str, repo: &str) -> impl FnOnce(DevconfError) -> DevconfError {
    let prefix = format!("Error getting {} for {}/{}", what, owner, repo);
    move |e| DevconfError::DependencyUnavailable(format!("{}: {}", prefix, e))
}

fn state_schema(noun: &str) -> Value {
    json!({
        "state": {"type": "string", "enum": ["open", "closed", "all"], "description": format!("{} state", noun)},
        "per_page": {"type": "integer", "description": format!("Number of {}s to fetch (max 20)", noun.to_lowercase())},
    })
}

/// The seven repository tools, sharing one client.
pub fn github_tools(client: GithubClient) -> Vec<Arc<dyn Tool>> {
    let client = Arc::new(client);

    let c = client.clone();
    let info = FunctionTool::new(
        "get_repository_info",
        "Get basic information about a GitHub repository",
        repo_schema(json!({})),
        move |input: Value| {
            let client = c.clone();
            async move {
                let (owner, repo) = owner_repo(&input)?;
                let data = client
                    .get(&format!("repos/{}/{}", owner, repo), &[])
                    .await
                    .map_err(context("repository info", &owner, &repo))?;
                Ok(repository_info(&data))
            }
        },
    );

    let c = client.clone();
    let languages = FunctionTool::new(
        "get_repository_languages",
        "Get programming languages used in a repository",
        repo_schema(json!({})),
        move |input: Value| {
            let client = c.clone();
            async move {
                let (owner, repo) = owner_repo(&input)?;
                let data = client
                    .get(&format!("repos/{}/{}/languages", owner, repo), &[])
                    .await
                    .map_err(context("languages", &owner, &repo))?;
                Ok(language_breakdown(&data))
            }
        },
    );

    let c = client.clone();
    let contributor_tool = FunctionTool::new(
        "get_repository_contributors",
        "Get contributors to a repository",
        repo_schema(json!({
            "per_page": {"type": "integer", "description": "Number of contributors to fetch (max 20)"}
        })),
        move |input: Value| {
            let client = c.clone();
            async move {
                let (owner, repo) = owner_repo(&input)?;
                let per_page = args::count(&input, "per_page", 20, 20);
                let data = client
                    .get(
                        &format!("repos/{}/{}/contributors", owner, repo),
                        &[("per_page", per_page.to_string())],
                    )
                    .await
                    .map_err(context("contributors", &owner, &repo))?;
                Ok(contributors(&data))
            }
        },
    );

    let c = client.clone();
    let issue_tool = FunctionTool::new(
        "get_repository_issues",
        "Get issues from a repository",
        repo_schema(state_schema("Issue")),
        move |input: Value| {
            let client = c.clone();
            async move {
                let (owner, repo) = owner_repo(&input)?;
                let query = [
                    ("state", args::str_or(&input, "state", "open").to_string()),
                    ("per_page", args::count(&input, "per_page", 20, 20).to_string()),
                ];
                let data = client
                    .get(&format!("repos/{}/{}/issues", owner, repo), &query)
                    .await
                    .map_err(context("issues", &owner, &repo))?;
                Ok(issues(&data))
            }
        },
    );

    let c = client.clone();
    let pull_tool = FunctionTool::new(
        "get_repository_pulls",
        "Get pull requests from a repository",
        repo_schema(state_schema("PR")),
        move |input: Value| {
            let client = c.clone();
            async move {
                let (owner, repo) = owner_repo(&input)?;
                let query = [
                    ("state", args::str_or(&input, "state", "open").to_string()),
                    ("per_page", args::count(&input, "per_page", 20, 20).to_string()),
                ];
                let data = client
                    .get(&format!("repos/{}/{}/pulls", owner, repo), &query)
                    .await
                    .map_err(context("pulls", &owner, &repo))?;
                Ok(pulls(&data))
            }
        },
    );

    let c = client.clone();
    let release_tool = FunctionTool::new(
        "get_repository_releases",
        "Get releases from a repository",
        repo_schema(json!({
            "per_page": {"type": "integer", "description": "Number of releases to fetch (max 20)"}
        })),
        move |input: Value| {
            let client = c.clone();
            async move {
                let (owner, repo) = owner_repo(&input)?;
                let per_page = args::count(&input, "per_page", 20, 20);
                let data = client
                    .get(
                        &format!("repos/{}/{}/releases", owner, repo),
                        &[("per_page", per_page.to_string())],
                    )
                    .await
                    .map_err(context("releases", &owner, &repo))?;
                Ok(releases(&data))
            }
        },
    );

    let c = client;
    let search_tool = FunctionTool::new(
        "search_repositories",
        "Search for repositories on GitHub",
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query"},
                "sort": {
                    "type": "string",
                    "enum": ["stars", "forks", "help-wanted-issues", "updated"],
                    "description": "Sort criteria"
                },
                "order": {"type": "string", "enum": ["asc", "desc"], "description": "Sort order"},
                "per_page": {"type": "integer", "description": "Number of results to fetch (max 10)"}
            },
            "required": ["query"]
        }),
        move |input: Value| {
            let client = c.clone();
            async move {
                let query = args::required_str(&input, "query")?.to_string();
                let params = [
                    ("q", query.clone()),
                    ("sort", args::str_or(&input, "sort", "stars").to_string()),
                    ("order", args::str_or(&input, "order", "desc").to_string()),
                    ("per_page", args::count(&input, "per_page", 10, 10).to_string()),
                ];
                let data = client.get("search/repositories", &params).await.map_err(|e| {
                    DevconfError::DependencyUnavailable(format!(
                        "Error searching repositories for {}: {}",
                        query, e
                    ))
                })?;
                Ok(search_results(&data))
            }
        },
    );

    vec![
        info.into_arc(),
        languages.into_arc(),
        contributor_tool.into_arc(),
        issue_tool.into_arc(),
        pull_tool.into_arc(),
        release_tool.into_arc(),
        search_tool.into_arc(),
    ]
}
