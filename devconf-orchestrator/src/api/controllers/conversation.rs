use crate::api::error::ApiError;
use crate::api::models::{
    EventType, MessageChunkResponse, MessageRequest, NO_RESPONSE, NewConversationResponse,
    StreamEventData,
};
use crate::api::user::CurrentUser;
use crate::supervisor::{Supervisor, SupervisorEvent, SupervisorStream};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderName, HeaderValue, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use devconf_core::DevconfError;
use devconf_session::{CreateRequest, SessionStore};
use futures::StreamExt;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct ConversationController {
    supervisor: Supervisor,
    sessions: Arc<dyn SessionStore>,
    expose_error_details: bool,
}

impl ConversationController {
    pub fn new(
        supervisor: Supervisor,
        sessions: Arc<dyn SessionStore>,
        expose_error_details: bool,
    ) -> Self {
        Self { supervisor, sessions, expose_error_details }
    }
}

pub async fn create_conversation(
    State(controller): State<ConversationController>,
    user: CurrentUser,
) -> Result<Json<NewConversationResponse>, ApiError> {
    let app_name = controller.supervisor.app_name().to_string();
    let conversation = controller
        .sessions
        .create(CreateRequest {
            app_name: app_name.clone(),
            user_id: user.id().to_string(),
            conversation_id: None,
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to create conversation");
            ApiError::internal("Unable to create conversation session")
        })?;

    tracing::info!(conversation_id = %conversation.id, user_id = %user.id(), "conversation created");
    Ok(Json(NewConversationResponse {
        conversation_id: conversation.id,
        user_id: conversation.user_id,
        app_name,
    }))
}

pub async fn post_message(
    State(controller): State<ConversationController>,
    Path(conversation_id): Path<String>,
    user: CurrentUser,
    body: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body?;
    let input = request.input.trim();
    if input.is_empty() {
        return Err(ApiError::unprocessable("Input cannot be empty."));
    }
    tracing::info!(
        conversation_id = %conversation_id,
        user_id = %user.id(),
        streaming = request.stream,
        "message received"
    );

    if request.stream {
        let stream = controller
            .supervisor
            .handle_message(user.id(), &conversation_id, input)
            .await
            .map_err(|e| ApiError::for_conversation(e, &conversation_id))?;
        return Ok(sse_response(stream, controller.expose_error_details));
    }

    let reply = controller
        .supervisor
        .handle_message_collected(user.id(), &conversation_id, input)
        .await
        .map_err(|e| ApiError::for_conversation(e, &conversation_id))?;

    let content = Some(reply.content).filter(|c| !c.trim().is_empty());
    Ok(Json(MessageChunkResponse {
        content: Some(content.unwrap_or_else(|| NO_RESPONSE.to_string())),
        conversation_id: reply.conversation_id,
        message_id: Some(reply.message_id),
        user_id: user.0,
        thinking: reply.thinking.unwrap_or_default(),
        done: true,
    })
    .into_response())
}

fn error_message(e: &DevconfError, expose: bool) -> String {
    if expose {
        return e.to_string();
    }
    match e {
        DevconfError::DependencyUnavailable(agent) => format!("Remote agent unavailable: {}", agent),
        _ => crate::api::error::MODEL_FAILURE_DETAIL.to_string(),
    }
}

fn event_data(event: SupervisorEvent, conversation_id: &str, message_id: &str) -> serde_json::Value {
    let data = match event {
        SupervisorEvent::Progress { author, message } => StreamEventData {
            author,
            is_final: false,
            conversation_id: conversation_id.to_string(),
            message_id: message_id.to_string(),
            event_type: EventType::Progress,
            progress_message: Some(message),
            content: None,
            thinking: None,
            error: None,
        },
        SupervisorEvent::Content { author, content, is_final, thinking } => StreamEventData {
            author,
            is_final,
            conversation_id: conversation_id.to_string(),
            message_id: message_id.to_string(),
            event_type: EventType::Content,
            progress_message: None,
            content: Some(content),
            thinking,
            error: None,
        },
        SupervisorEvent::Completed(_) => {
            return json!({
                "done": true,
                "conversation_id": conversation_id,
                "message_id": message_id,
                "event_type": EventType::Done,
            });
        }
    };
    serde_json::to_value(data).unwrap_or_default()
}

/// `text/event-stream` of [`StreamEventData`]; ends after `done` or `error`.
fn sse_response(stream: SupervisorStream, expose_error_details: bool) -> Response {
    let SupervisorStream { conversation_id, message_id, mut events } = stream;

    let sse_stream = async_stream::stream! {
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => {
                    let done = matches!(event, SupervisorEvent::Completed(_));
                    let data = event_data(event, &conversation_id, &message_id);
                    yield Ok::<_, Infallible>(Event::default().data(data.to_string()));
                    if done {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(conversation_id = %conversation_id, error = %e, "streaming failed");
                    let data = json!({
                        "error": error_message(&e, expose_error_details),
                        "conversation_id": conversation_id,
                        "message_id": message_id,
                        "event_type": EventType::Error,
                    });
                    yield Ok(Event::default().data(data.to_string()));
                    break;
                }
            }
        }
    };

    let headers = [
        (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        (HeaderName::from_static("x-accel-buffering"), HeaderValue::from_static("no")),
    ];
    let sse = Sse::new(sse_stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)));
    (headers, sse).into_response()
}
