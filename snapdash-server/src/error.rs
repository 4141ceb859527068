use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use snapdash_core::SnapError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    /// An external tool failed; its message is passed through
    #[error("{0}")]
    Tool(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<SnapError> for AppError {
    fn from(err: SnapError) -> Self {
        match err {
            SnapError::InvalidLocation(m) => AppError::BadRequest(m),
            e @ (SnapError::Command { .. }
            | SnapError::Timeout { .. }
            | SnapError::Spawn { .. }) => AppError::Tool(e.to_string()),
            e => AppError::Internal(e.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            AppError::ServiceUnavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
            AppError::Tool(m) => {
                tracing::warn!("External tool failed: {m}");
                (StatusCode::BAD_GATEWAY, m.clone())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };
        (status, Json(json!({ "error": msg }))).into_response()
    }
}
