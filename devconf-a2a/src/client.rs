use crate::executor::{AgentOutput, AgentOutputStream};
use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse, MessageSendParams, Task, TaskIdParams, methods};
use crate::types::{AgentCard, Message, TaskState, UpdateEvent};
use devconf_core::{DevconfError, Result};
use eventsource_stream::{EventStreamError, Eventsource};
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::time::Duration;

pub type UpdateStream = Pin<Box<dyn Stream<Item = Result<UpdateEvent>> + Send>>;

#[derive(Debug, Clone)]
pub struct A2aClientConfig {
    /// Whole-request timeout; streaming calls are bounded by it too.
    pub timeout: Option<Duration>,
    pub connect_timeout: Duration,
    pub verify_ssl: bool,
}

impl Default for A2aClientConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(120)),
            connect_timeout: Duration::from_secs(5),
            verify_ssl: true,
        }
    }
}

/// A2A client for one remote agent, addressed by its base URL.
#[derive(Clone)]
pub struct A2aClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl A2aClient {
    pub fn new(base_url: &str, config: &A2aClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .danger_accept_invalid_certs(!config.verify_ssl);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| DevconfError::A2a(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/a2a", self.base_url)
    }

    fn unavailable(&self, e: impl std::fmt::Display) -> DevconfError {
        DevconfError::DependencyUnavailable(format!("{}: {}", self.base_url, e))
    }

    fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else if status.is_server_error() {
            Err(self.unavailable(format!("HTTP {}", status)))
        } else {
            Err(DevconfError::A2a(format!("{} rejected the request: HTTP {}", self.base_url, status)))
        }
    }

    /// Fetch the agent card from `/.well-known/agent.json`.
    pub async fn resolve_agent_card(&self) -> Result<AgentCard> {
        let url = format!("{}/.well-known/agent.json", self.base_url);
        let response =
            self.http_client.get(&url).send().await.map_err(|e| self.unavailable(e))?;
        let response = self.check_status(response)?;

        response
            .json()
            .await
            .map_err(|e| DevconfError::A2a(format!("Failed to parse agent card: {}", e)))
    }

    async fn post(&self, url: &str, request: &JsonRpcRequest) -> Result<reqwest::Response> {
        let response = self
            .http_client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;
        self.check_status(response)
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let response = self.post(&self.endpoint(), &JsonRpcRequest::new(method, params)).await?;
        let rpc_response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| DevconfError::A2a(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = rpc_response.error {
            return Err(DevconfError::A2a(format!("RPC error: {} ({})", error.message, error.code)));
        }
        rpc_response.result.ok_or_else(|| DevconfError::A2a("Empty JSON-RPC result".to_string()))
    }

    /// Send a message and wait for the finished task.
    pub async fn send_message(&self, message: Message) -> Result<Task> {
        let params = serde_json::to_value(MessageSendParams { message })?;
        let result = self.call(methods::MESSAGE_SEND, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Task> {
        let params = serde_json::to_value(TaskIdParams { task_id: task_id.to_string() })?;
        let result = self.call(methods::TASKS_GET, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn cancel_task(&self, task_id: &str) -> Result<Task> {
        let params = serde_json::to_value(TaskIdParams { task_id: task_id.to_string() })?;
        let result = self.call(methods::TASKS_CANCEL, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Send a message and receive streaming events via SSE
    pub async fn send_streaming_message(&self, message: Message) -> Result<UpdateStream> {
        let stream_url = format!("{}/stream", self.endpoint());
        let params = serde_json::to_value(MessageSendParams { message })?;
        let response = self
            .post(&stream_url, &JsonRpcRequest::new(methods::MESSAGE_SEND_STREAM, params))
            .await?;
        let base_url = self.base_url.clone();

        let stream = async_stream::stream! {
            let mut events = response.bytes_stream().eventsource();

            while let Some(event) = events.next().await {
                let data = match event {
                    Ok(event) => event.data,
                    Err(EventStreamError::Transport(e)) if e.is_timeout() => {
                        yield Err(DevconfError::DependencyUnavailable(format!("{}: {}", base_url, e)));
                        break;
                    }
                    Err(e) => {
                        yield Err(DevconfError::A2a(format!("Stream error: {}", e)));
                        break;
                    }
                };
                // `done` frames carry no payload
                if data.is_empty() {
                    continue;
                }

                match serde_json::from_str::<JsonRpcResponse>(&data) {
                    Ok(JsonRpcResponse { error: Some(error), .. }) => {
                        yield Err(DevconfError::A2a(format!(
                            "RPC error: {} ({})",
                            error.message, error.code
                        )));
                    }
                    Ok(JsonRpcResponse { result: Some(result), .. }) => {
                        match serde_json::from_value::<UpdateEvent>(result) {
                            Ok(event) => yield Ok(event),
                            Err(e) => tracing::debug!("Skipping unknown stream event: {}", e),
                        }
                    }
                    Ok(_) => {}
                    Err(e) => tracing::debug!("Failed to parse SSE data: {}", e),
                }
            }
        };

        Ok(Box::pin(stream))
    }

    /// Stream a message and flatten the update events into agent outputs.
    pub async fn stream_reply(&self, message: Message) -> Result<AgentOutputStream> {
        let events = self.send_streaming_message(message).await?;
        Ok(agent_outputs(events))
    }
}

/// Reply text of a finished task. Failed and canceled tasks are errors.
pub fn reply_text(task: &Task) -> Result<String> {
    match task.status.state {
        TaskState::Failed => Err(DevconfError::A2a(
            task.status.message.clone().unwrap_or_else(|| "Remote task failed".to_string()),
        )),
        TaskState::Canceled => Err(DevconfError::A2a(format!("Remote task {} was canceled", task.id))),
        _ => Ok(task.artifact_text()),
    }
}

/// Map status and artifact updates onto [`AgentOutput`]s. A failed or
/// canceled status ends the stream with an error.
pub fn agent_outputs(mut events: UpdateStream) -> AgentOutputStream {
    Box::pin(async_stream::stream! {
        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            };

            match event {
                UpdateEvent::TaskArtifactUpdate(update) => {
                    for part in &update.artifact.parts {
                        if let Some(text) = part.as_text().filter(|t| !t.is_empty()) {
                            yield Ok(AgentOutput::TextChunk(text.to_string()));
                        }
                    }
                }
                UpdateEvent::TaskStatusUpdate(update) => match update.status.state {
                    TaskState::Failed => {
                        let message = update
                            .status
                            .message
                            .unwrap_or_else(|| "Remote task failed".to_string());
                        yield Err(DevconfError::A2a(message));
                        break;
                    }
                    TaskState::Canceled => {
                        yield Err(DevconfError::A2a(format!(
                            "Remote task {} was canceled",
                            update.task_id
                        )));
                        break;
                    }
                    TaskState::Submitted | TaskState::Working => {
                        if let Some(message) = update.status.message {
                            yield Ok(AgentOutput::Progress(message));
                        }
                    }
                    TaskState::InputRequired | TaskState::Completed => {}
                },
            }
        }
    })
}
