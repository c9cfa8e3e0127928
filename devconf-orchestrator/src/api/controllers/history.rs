use crate::api::error::ApiError;
use crate::api::models::{HistoryQuery, SessionDetail, SessionListResponse, SessionSummary};
use crate::api::user::CurrentUser;
use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use devconf_session::{GetRequest, ListRequest, SessionStore};
use std::sync::Arc;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;
pub const MAX_HISTORY_LIMIT: usize = 50;
const HISTORY_UNAVAILABLE: &str =
    "History feature not available. Database storage is not enabled.";

#[derive(Clone)]
pub struct HistoryController {
    sessions: Arc<dyn SessionStore>,
    app_name: String,
}

impl HistoryController {
    pub fn new(sessions: Arc<dyn SessionStore>, app_name: impl Into<String>) -> Self {
        Self { sessions, app_name: app_name.into() }
    }

    fn ensure_persistent(&self) -> Result<(), ApiError> {
        if self.sessions.is_persistent() {
            Ok(())
        } else {
            Err(ApiError::internal(HISTORY_UNAVAILABLE))
        }
    }
}

pub async fn list_history(
    State(controller): State<HistoryController>,
    user: CurrentUser,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<SessionListResponse>, ApiError> {
    controller.ensure_persistent()?;
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
        return Err(ApiError::unprocessable(format!(
            "limit must be between 1 and {}",
            MAX_HISTORY_LIMIT
        )));
    }

    let conversations = controller
        .sessions
        .list(ListRequest {
            app_name: controller.app_name.clone(),
            user_id: user.id().to_string(),
            limit: Some(limit),
        })
        .await?;

    let sessions: Vec<SessionSummary> = conversations.iter().map(SessionSummary::from).collect();
    tracing::debug!(user_id = %user.id(), count = sessions.len(), "history listed");
    Ok(Json(SessionListResponse { total_count: sessions.len(), sessions }))
}

pub async fn get_history(
    State(controller): State<HistoryController>,
    Path(conversation_id): Path<String>,
    user: CurrentUser,
) -> Result<Json<SessionDetail>, ApiError> {
    controller.ensure_persistent()?;
    let conversation = controller
        .sessions
        .get(GetRequest {
            app_name: controller.app_name.clone(),
            user_id: user.id().to_string(),
            conversation_id: conversation_id.clone(),
        })
        .await
        .map_err(|e| ApiError::for_conversation(e, &conversation_id))?;

    Ok(Json(SessionDetail::from(&conversation)))
}
