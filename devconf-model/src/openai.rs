//! OpenAI-compatible chat completions client.
//!
//! Works against any server exposing `POST {base_url}/chat/completions`
//! (vLLM, Ollama, LiteLLM, OpenAI itself, Gemini's OpenAI endpoint).

use crate::chat::{
    ChatDelta, ChatMessage, ChatModel, ChatRequest, ChatResponse, ChatStream, ToolCall,
    ToolCallDelta, ToolDefinition,
};
use async_trait::async_trait;
use devconf_core::{DevconfError, Result};
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone)]
pub struct OpenAiCompatibleConfig {
    /// Used in log lines and error messages.
    pub provider_name: String,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Whole-request timeout. `None` leaves reqwest's default (no limit).
    pub timeout: Option<Duration>,
    pub connect_timeout: Duration,
    pub verify_ssl: bool,
}

impl OpenAiCompatibleConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider_name: "openai-compatible".to_string(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            connect_timeout: Duration::from_secs(5),
            verify_ssl: true,
        }
    }

    pub fn with_provider_name(mut self, provider_name: impl Into<String>) -> Self {
        self.provider_name = provider_name.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_verify_ssl(mut self, verify_ssl: bool) -> Self {
        self.verify_ssl = verify_ssl;
        self
    }
}

pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    config: OpenAiCompatibleConfig,
}

impl OpenAiCompatibleClient {
    pub fn new(config: OpenAiCompatibleConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .danger_accept_invalid_certs(!config.verify_ssl);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| DevconfError::Model(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAiCompatibleConfig {
        &self.config
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn build_request<'a>(&'a self, request: &'a ChatRequest, stream: bool) -> WireRequest<'a> {
        WireRequest {
            model: request.model.as_deref().unwrap_or(&self.config.model),
            messages: &request.messages,
            tools: (!request.tools.is_empty()).then_some(request.tools.as_slice()),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        }
    }

    async fn send(&self, request: &ChatRequest, stream: bool) -> Result<reqwest::Response> {
        let body = self.build_request(request, stream);
        tracing::debug!(
            provider = %self.config.provider_name,
            model = body.model,
            messages = body.messages.len(),
            stream,
            "sending chat completion"
        );

        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                DevconfError::Model(format!(
                    "{} API request failed: {}",
                    self.config.provider_name, e
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(DevconfError::Model(format!(
                "{} API error ({}): {}",
                self.config.provider_name, status, error_text
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
        let response = self.send(&request, false).await?;
        let body: WireResponse = response.json().await.map_err(|e| {
            DevconfError::Model(format!(
                "{} returned an unreadable response: {}",
                self.config.provider_name, e
            ))
        })?;

        let choice = body.choices.into_iter().next().ok_or_else(|| {
            DevconfError::Model(format!("{} returned no choices", self.config.provider_name))
        })?;

        Ok(ChatResponse {
            content: choice.message.content,
            reasoning: choice.message.reasoning_content,
            tool_calls: choice.message.tool_calls,
            finish_reason: choice.finish_reason,
        })
    }

    async fn stream(&self, request: ChatRequest) -> Result<ChatStream> {
        let response = self.send(&request, true).await?;
        let provider = self.config.provider_name.clone();

        let stream = async_stream::try_stream! {
            let mut events = response.bytes_stream().eventsource();

            while let Some(event) = events.next().await {
                let event = event
                    .map_err(|e| DevconfError::Model(format!("{} stream read error: {}", provider, e)))?;
                if let Some(delta) = parse_stream_data(&event.data)? {
                    yield delta;
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Parse the data of one SSE event of a streamed completion. Empty data and
/// the `[DONE]` sentinel yield `None`.
pub(crate) fn parse_stream_data(data: &str) -> Result<Option<ChatDelta>> {
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    let chunk: WireChunk = serde_json::from_str(data)
        .map_err(|e| DevconfError::Model(format!("malformed stream chunk: {}", e)))?;
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(None);
    };

    Ok(Some(ChatDelta {
        content: choice.delta.content,
        reasoning: choice.delta.reasoning_content,
        tool_calls: choice
            .delta
            .tool_calls
            .into_iter()
            .map(|tc| ToolCallDelta {
                index: tc.index,
                id: tc.id,
                name: tc.function.as_ref().and_then(|f| f.name.clone()),
                arguments: tc.function.and_then(|f| f.arguments),
            })
            .collect(),
        finish_reason: choice.finish_reason,
    }))
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default, alias = "reasoning")]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Deserialize)]
struct WireChunk {
    #[serde(default)]
    choices: Vec<WireChunkChoice>,
}

#[derive(Deserialize)]
struct WireChunkChoice {
    #[serde(default)]
    delta: WireDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default, alias = "reasoning")]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCallDelta>,
}

#[derive(Deserialize)]
struct WireToolCallDelta {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<WireFunctionDelta>,
}

#[derive(Deserialize)]
struct WireFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}
