use crate::executor::{AgentExecutor, AgentOutput, AgentOutputStream, RequestContext};
use crate::jsonrpc::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, MessageSendParams, Task, TaskIdParams,
    methods,
};
use crate::types::{
    AgentCard, Artifact, TaskArtifactUpdateEvent, TaskState, TaskStatus, TaskStatusUpdateEvent,
    UpdateEvent,
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use devconf_core::{DevconfError, Result};
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{collections::HashMap, convert::Infallible, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

struct TaskEntry {
    task: Task,
    cancel: CancellationToken,
}

pub enum CancelOutcome {
    Canceled(Task),
    NotCancelable(Task),
    NotFound,
}

/// In-memory task storage. Each running task keeps the token `tasks/cancel`
/// fires.
#[derive(Default)]
pub struct TaskStore {
    tasks: RwLock<HashMap<String, TaskEntry>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task as `working` and hand back its cancellation token.
    pub async fn start(&self, task_id: &str, context_id: &str) -> CancellationToken {
        let cancel = CancellationToken::new();
        let task = Task {
            id: task_id.to_string(),
            context_id: Some(context_id.to_string()),
            status: TaskStatus::new(TaskState::Working),
            artifacts: Vec::new(),
        };
        self.tasks
            .write()
            .await
            .insert(task_id.to_string(), TaskEntry { task, cancel: cancel.clone() });
        cancel
    }

    pub async fn finish(&self, task: Task) {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&task.id) {
            Some(entry) => entry.task = task,
            None => {
                let id = task.id.clone();
                tasks.insert(id, TaskEntry { task, cancel: CancellationToken::new() });
            }
        }
    }

    pub async fn get(&self, task_id: &str) -> Option<Task> {
        self.tasks.read().await.get(task_id).map(|e| e.task.clone())
    }

    pub async fn cancel(&self, task_id: &str) -> CancelOutcome {
        let mut tasks = self.tasks.write().await;
        let Some(entry) = tasks.get_mut(task_id) else {
            return CancelOutcome::NotFound;
        };
        if entry.task.status.state.is_terminal() {
            return CancelOutcome::NotCancelable(entry.task.clone());
        }
        entry.cancel.cancel();
        entry.task.status = TaskStatus::new(TaskState::Canceled);
        CancelOutcome::Canceled(entry.task.clone())
    }
}

/// Serves one [`AgentExecutor`] over A2A.
#[derive(Clone)]
pub struct A2aServer {
    agent_card: Arc<AgentCard>,
    executor: Arc<dyn AgentExecutor>,
    task_store: Arc<TaskStore>,
    expose_error_details: bool,
}

impl A2aServer {
    pub fn new(agent_card: AgentCard, executor: Arc<dyn AgentExecutor>) -> Self {
        Self {
            agent_card: Arc::new(agent_card),
            executor,
            task_store: Arc::new(TaskStore::new()),
            expose_error_details: false,
        }
    }

    pub fn with_expose_error_details(mut self, expose: bool) -> Self {
        self.expose_error_details = expose;
        self
    }

    pub fn agent_card(&self) -> &AgentCard {
        &self.agent_card
    }

    pub fn task_store(&self) -> Arc<TaskStore> {
        self.task_store.clone()
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/.well-known/agent.json", get(get_agent_card))
            .route("/.well-known/agent-card.json", get(get_agent_card))
            .route("/a2a", post(handle_jsonrpc))
            .route("/a2a/stream", post(handle_jsonrpc_stream))
            .with_state(self)
    }

    fn failure_message(&self, error: &DevconfError) -> String {
        JsonRpcError::internal_error_sanitized(error, self.expose_error_details).message
    }

    fn new_context(&self, params: &MessageSendParams) -> (String, String) {
        let context_id = params
            .message
            .context_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let task_id =
            params.message.task_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        (task_id, context_id)
    }
}

/// GET /.well-known/agent.json - Serve the agent card
pub async fn get_agent_card(State(server): State<A2aServer>) -> impl IntoResponse {
    Json(server.agent_card.as_ref().clone())
}

/// POST /a2a - JSON-RPC endpoint for A2A protocol
pub async fn handle_jsonrpc(State(server): State<A2aServer>, body: Bytes) -> Json<JsonRpcResponse> {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(response) => return Json(response),
    };

    let id = request.id.clone();
    let response = match request.method.as_str() {
        methods::MESSAGE_SEND => match parse_params::<MessageSendParams>(request.params) {
            Ok(params) => handle_message_send(&server, params, id).await,
            Err(e) => JsonRpcResponse::error(id, e),
        },
        methods::TASKS_GET => match parse_params::<TaskIdParams>(request.params) {
            Ok(params) => match server.task_store.get(&params.task_id).await {
                Some(task) => JsonRpcResponse::success(id, to_value(&task)),
                None => JsonRpcResponse::error(id, JsonRpcError::task_not_found(&params.task_id)),
            },
            Err(e) => JsonRpcResponse::error(id, e),
        },
        methods::TASKS_CANCEL => match parse_params::<TaskIdParams>(request.params) {
            Ok(params) => match server.task_store.cancel(&params.task_id).await {
                CancelOutcome::Canceled(task) => {
                    tracing::info!(task_id = %task.id, "task canceled");
                    JsonRpcResponse::success(id, to_value(&task))
                }
                CancelOutcome::NotCancelable(_) => {
                    JsonRpcResponse::error(id, JsonRpcError::task_not_cancelable(&params.task_id))
                }
                CancelOutcome::NotFound => {
                    JsonRpcResponse::error(id, JsonRpcError::task_not_found(&params.task_id))
                }
            },
            Err(e) => JsonRpcResponse::error(id, e),
        },
        other => JsonRpcResponse::error(id, JsonRpcError::method_not_found(other)),
    };

    Json(response)
}

/// POST /a2a/stream - SSE streaming endpoint for A2A protocol
pub async fn handle_jsonrpc_stream(
    State(server): State<A2aServer>,
    body: Bytes,
) -> std::result::Result<
    Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>,
    (StatusCode, Json<JsonRpcResponse>),
> {
    let request = parse_request(&body).map_err(|r| (StatusCode::BAD_REQUEST, Json(r)))?;

    if request.method != methods::MESSAGE_SEND_STREAM && request.method != methods::MESSAGE_SEND {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(JsonRpcResponse::error(
                request.id.clone(),
                JsonRpcError::method_not_found(&request.method),
            )),
        ));
    }

    let params = parse_params::<MessageSendParams>(request.params).map_err(|e| {
        (StatusCode::BAD_REQUEST, Json(JsonRpcResponse::error(request.id.clone(), e)))
    })?;

    let stream = create_message_stream(server, params, request.id);
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping")))
}

fn parse_request(body: &[u8]) -> std::result::Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| JsonRpcResponse::error(None, JsonRpcError::parse_error(e.to_string())))?;
    let id = value.get("id").cloned();
    let request: JsonRpcRequest = serde_json::from_value(value)
        .map_err(|e| JsonRpcResponse::error(id.clone(), JsonRpcError::invalid_request(e.to_string())))?;
    if request.jsonrpc != "2.0" {
        return Err(JsonRpcResponse::error(
            id,
            JsonRpcError::invalid_request("Invalid JSON-RPC version"),
        ));
    }
    Ok(request)
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> std::result::Result<T, JsonRpcError> {
    let params = params.ok_or_else(|| JsonRpcError::invalid_params("Missing params"))?;
    serde_json::from_value(params).map_err(|e| JsonRpcError::invalid_params(e.to_string()))
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

/// Drain the executor into one string, stopping early on cancellation.
async fn collect_reply(
    executor: Arc<dyn AgentExecutor>,
    ctx: RequestContext,
    cancel: CancellationToken,
) -> Result<String> {
    let mut outputs: AgentOutputStream = executor.execute(ctx).await?;
    let mut reply = String::new();
    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => break,
            item = outputs.next() => item,
        };
        match item {
            Some(Ok(AgentOutput::TextChunk(chunk))) => reply.push_str(&chunk),
            Some(Ok(AgentOutput::Progress(_))) => {}
            Some(Err(e)) => return Err(e),
            None => break,
        }
    }
    Ok(reply)
}

async fn handle_message_send(
    server: &A2aServer,
    params: MessageSendParams,
    id: Option<Value>,
) -> JsonRpcResponse {
    let (task_id, context_id) = server.new_context(&params);
    let cancel = server.task_store.start(&task_id, &context_id).await;
    tracing::info!(task_id = %task_id, "message/send started");

    let ctx = RequestContext {
        task_id: task_id.clone(),
        context_id: context_id.clone(),
        message: params.message,
        cancel: cancel.clone(),
    };
    let result = collect_reply(server.executor.clone(), ctx, cancel.clone()).await;

    let (status, reply) = match result {
        _ if cancel.is_cancelled() => (TaskStatus::new(TaskState::Canceled), String::new()),
        Ok(reply) => (TaskStatus::new(TaskState::Completed), reply),
        Err(e) => (TaskStatus::with_message(TaskState::Failed, server.failure_message(&e)), String::new()),
    };

    let mut task = Task { id: task_id, context_id: Some(context_id), status, artifacts: Vec::new() };
    if !reply.is_empty() {
        task.artifacts.push(Artifact::text(uuid::Uuid::new_v4().to_string(), reply));
    }
    tracing::info!(task_id = %task.id, state = ?task.status.state, "message/send finished");
    server.task_store.finish(task.clone()).await;

    JsonRpcResponse::success(id, to_value(&task))
}

fn sse_event(request_id: &Option<Value>, event: &UpdateEvent) -> Event {
    let response = JsonRpcResponse::success(request_id.clone(), to_value(event));
    Event::default().data(serde_json::to_string(&response).unwrap_or_default())
}

fn status_update(
    task_id: &str,
    context_id: &str,
    status: TaskStatus,
    final_update: bool,
) -> UpdateEvent {
    UpdateEvent::TaskStatusUpdate(TaskStatusUpdateEvent {
        task_id: task_id.to_string(),
        context_id: Some(context_id.to_string()),
        status,
        final_update,
    })
}

fn create_message_stream(
    server: A2aServer,
    params: MessageSendParams,
    request_id: Option<Value>,
) -> impl Stream<Item = std::result::Result<Event, Infallible>> {
    async_stream::stream! {
        let (task_id, context_id) = server.new_context(&params);
        let cancel = server.task_store.start(&task_id, &context_id).await;
        let artifact_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(task_id = %task_id, "message/stream started");

        yield Ok(sse_event(
            &request_id,
            &status_update(&task_id, &context_id, TaskStatus::new(TaskState::Working), false),
        ));

        let ctx = RequestContext {
            task_id: task_id.clone(),
            context_id: context_id.clone(),
            message: params.message,
            cancel: cancel.clone(),
        };

        let mut reply = String::new();
        let mut failure: Option<String> = None;
        match server.executor.execute(ctx).await {
            Ok(mut outputs) => loop {
                let item = tokio::select! {
                    _ = cancel.cancelled() => break,
                    item = outputs.next() => item,
                };
                match item {
                    Some(Ok(AgentOutput::Progress(message))) => {
                        let status = TaskStatus::with_message(TaskState::Working, message);
                        yield Ok(sse_event(&request_id, &status_update(&task_id, &context_id, status, false)));
                    }
                    Some(Ok(AgentOutput::TextChunk(chunk))) => {
                        if chunk.is_empty() {
                            continue;
                        }
                        let append = !reply.is_empty();
                        reply.push_str(&chunk);
                        let event = UpdateEvent::TaskArtifactUpdate(TaskArtifactUpdateEvent {
                            task_id: task_id.clone(),
                            context_id: Some(context_id.clone()),
                            artifact: Artifact::text(artifact_id.clone(), chunk),
                            append,
                            last_chunk: false,
                        });
                        yield Ok(sse_event(&request_id, &event));
                    }
                    Some(Err(e)) => {
                        failure = Some(server.failure_message(&e));
                        break;
                    }
                    None => break,
                }
            },
            Err(e) => failure = Some(server.failure_message(&e)),
        }

        let status = if cancel.is_cancelled() {
            TaskStatus::new(TaskState::Canceled)
        } else if let Some(message) = failure {
            TaskStatus::with_message(TaskState::Failed, message)
        } else {
            TaskStatus::new(TaskState::Completed)
        };

        let mut task = Task {
            id: task_id.clone(),
            context_id: Some(context_id.clone()),
            status: status.clone(),
            artifacts: Vec::new(),
        };
        if !reply.is_empty() {
            task.artifacts.push(Artifact::text(artifact_id.clone(), reply));
        }
        tracing::info!(task_id = %task_id, state = ?status.state, "message/stream finished");
        server.task_store.finish(task).await;

        yield Ok(sse_event(&request_id, &status_update(&task_id, &context_id, status, true)));
        yield Ok(Event::default().event("done").data(""));
    }
}
