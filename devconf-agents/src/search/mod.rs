//! Web search through the Tavily API.

use crate::tool::{FunctionTool, Tool, args};
use devconf_core::{DevconfError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

pub const TAVILY_API_URL: &str = "https://api.tavily.com";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    #[default]
    Basic,
    Advanced,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: u64,
    search_depth: SearchDepth,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub published_date: String,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResults {
    pub query: String,
    pub results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyHit>,
}

/// Tavily omits or nulls fields freely.
#[derive(Deserialize)]
struct TavilyHit {
    title: Option<String>,
    url: Option<String>,
    content: Option<String>,
    published_date: Option<String>,
    score: Option<f64>,
}

#[derive(Clone)]
pub struct TavilyClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, TAVILY_API_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DevconfError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { http, api_key: api_key.into(), base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub async fn search(
        &self,
        query: &str,
        max_results: u64,
        search_depth: SearchDepth,
    ) -> Result<SearchResults> {
        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&SearchRequest { query, max_results, search_depth })
            .send()
            .await
            .map_err(|e| DevconfError::DependencyUnavailable(format!("Error searching the web: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DevconfError::DependencyUnavailable(format!(
                "Error searching the web: {} {}",
                status.as_u16(),
                body
            )));
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|e| DevconfError::Internal(format!("Tavily returned invalid JSON: {}", e)))?;

        Ok(SearchResults {
            query: query.to_string(),
            results: body
                .results
                .into_iter()
                .map(|hit| SearchHit {
                    title: hit.title.unwrap_or_default(),
                    url: hit.url.unwrap_or_default(),
                    content: hit.content.unwrap_or_default(),
                    published_date: hit.published_date.unwrap_or_default(),
                    score: hit.score.unwrap_or(0.0),
                })
                .collect(),
        })
    }
}

pub fn web_search_tool(client: TavilyClient) -> Arc<dyn Tool> {
    let client = Arc::new(client);
    FunctionTool::new(
        "web_search",
        "Search the web for information. Returns titles, URLs and content snippets.",
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The search query to search the web."},
                "max_results": {"type": "integer", "description": "The maximum number of results to return."},
                "search_depth": {
                    "type": "string",
                    "enum": ["basic", "advanced"],
                    "description": "The depth of the search."
                }
            },
            "required": ["query"]
        }),
        move |input: Value| {
            let client = client.clone();
            async move {
                let query = args::required_str(&input, "query")?.to_string();
                let max_results = args::count(&input, "max_results", 5, 20);
                let depth = match args::str_or(&input, "search_depth", "basic") {
                    "advanced" => SearchDepth::Advanced,
                    _ => SearchDepth::Basic,
                };
                let results = client.search(&query, max_results, depth).await?;
                Ok(serde_json::to_value(results)?)
            }
        },
    )
    .into_arc()
}
