use crate::api::error::ApiError;
use crate::api::models::{FeedbackBody, FeedbackResponse};
use crate::api::user::CurrentUser;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use devconf_core::Role;
use devconf_session::{FeedbackRequest, FeedbackStore, GetRequest, SessionStore};
use std::sync::Arc;

pub const MAX_COMMENT_CHARS: usize = 1000;
pub const MAX_PREDEFINED_RESPONSE_CHARS: usize = 500;
const UNKNOWN_AGENT: &str = "unknown";

#[derive(Clone)]
pub struct FeedbackController {
    sessions: Arc<dyn SessionStore>,
    feedback: Arc<dyn FeedbackStore>,
    app_name: String,
}

impl FeedbackController {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        feedback: Arc<dyn FeedbackStore>,
        app_name: impl Into<String>,
    ) -> Self {
        Self { sessions, feedback, app_name: app_name.into() }
    }
}

fn bounded(value: Option<String>, field: &str, max_chars: usize) -> Result<Option<String>, ApiError> {
    let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > max_chars {
        return Err(ApiError::unprocessable(format!(
            "{} must be at most {} characters",
            field, max_chars
        )));
    }
    Ok(Some(value))
}

pub async fn submit_feedback(
    State(controller): State<FeedbackController>,
    Path((conversation_id, message_id)): Path<(String, String)>,
    user: CurrentUser,
    body: Result<Json<FeedbackBody>, JsonRejection>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let Json(body) = body?;
    let comment = bounded(body.comment, "comment", MAX_COMMENT_CHARS)?;
    let predefined_response =
        bounded(body.predefined_response, "predefined_response", MAX_PREDEFINED_RESPONSE_CHARS)?;

    let conversation = controller
        .sessions
        .get(GetRequest {
            app_name: controller.app_name.clone(),
            user_id: user.id().to_string(),
            conversation_id: conversation_id.clone(),
        })
        .await
        .map_err(|e| ApiError::for_conversation(e, &conversation_id))?;

    let turn: Vec<_> =
        conversation.messages.iter().filter(|m| m.message_id == message_id).collect();
    if turn.is_empty() {
        return Err(ApiError::not_found(format!("Message not found: {}", message_id)));
    }
    let source_agent = turn
        .iter()
        .find(|m| m.role == Role::Agent)
        .map(|m| m.author.clone())
        .unwrap_or_else(|| UNKNOWN_AGENT.to_string());

    let record = controller
        .feedback
        .upsert_feedback(FeedbackRequest {
            user_id: user.id().to_string(),
            conversation_id,
            message_id,
            feedback_type: body.feedback_type,
            comment,
            predefined_response,
            source_agent,
        })
        .await?;

    tracing::info!(
        feedback_id = %record.feedback_id,
        feedback_type = record.feedback_type.as_str(),
        source_agent = %record.source_agent,
        "feedback recorded"
    );
    Ok(Json(FeedbackResponse::from(record)))
}
