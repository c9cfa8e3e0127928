use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use devconf_core::DevconfError;
use serde_json::json;

pub const MODEL_FAILURE_DETAIL: &str = "AI assistant is not able to process the message";
pub const INTERNAL_DETAIL: &str = "Internal server error occurred";

/// HTTP error rendered as `{"detail": ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self { status, detail: detail.into() }
    }

    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }

    pub fn conversation_not_found(conversation_id: &str) -> Self {
        Self::not_found(format!("Conversation not found: {}", conversation_id))
    }

    /// Like `From<DevconfError>`, except that an unknown conversation reads
    /// `Conversation not found: {id}`.
    pub fn for_conversation(e: DevconfError, conversation_id: &str) -> Self {
        match e {
            DevconfError::NotFound(_) => Self::conversation_not_found(conversation_id),
            other => other.into(),
        }
    }
}

impl From<DevconfError> for ApiError {
    fn from(e: DevconfError) -> Self {
        match e {
            DevconfError::Validation(detail) => Self::new(StatusCode::BAD_REQUEST, detail),
            DevconfError::NotFound(what) => Self::not_found(format!("Not found: {}", what)),
            DevconfError::DependencyUnavailable(agent) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Remote agent unavailable: {}", agent),
            ),
            DevconfError::Model(detail) | DevconfError::A2a(detail) => {
                tracing::error!(detail = %detail, "message processing failed");
                Self::internal(MODEL_FAILURE_DETAIL)
            }
            other => {
                tracing::error!(error = %other, "request failed");
                Self::internal(INTERNAL_DETAIL)
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::unprocessable(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::unprocessable(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
