use devconf_core::{DevconfError, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::time::Duration;

pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Minimal GitHub REST client: authenticated GETs returning raw JSON.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
}

impl GithubClient {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(token, GITHUB_API_URL)
    }

    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("GitHub-Project-Analyst-Agent"));
        let auth = HeaderValue::from_str(&format!("token {}", token))
            .map_err(|e| DevconfError::Config(format!("invalid GITHUB_TOKEN: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DevconfError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    /// GET `{base}/{endpoint}`. Non-200 answers become errors carrying the
    /// status and body.
    pub async fn get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        tracing::debug!(url = %url, "GitHub API request");

        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| DevconfError::DependencyUnavailable(format!("GitHub API request failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "GitHub API request failed");
            return Err(DevconfError::DependencyUnavailable(format!(
                "GitHub API request failed: {} {}",
                status.as_u16(),
                body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| DevconfError::Internal(format!("GitHub API returned invalid JSON: {}", e)))
    }
}
