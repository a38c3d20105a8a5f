use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::auth::AuthError;
use crate::services::gallery_service::GalleryError;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = self.status.as_u16(), "{}", self.message);
        }

        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

/// Handler-side auth failures carry the same stable code as the bearer gate.
impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        tracing::debug!(error_type = err.code(), "request rejected: {}", err);
        AppError::new(StatusCode::UNAUTHORIZED, err.code())
    }
}

impl From<GalleryError> for AppError {
    fn from(err: GalleryError) -> Self {
        match err {
            GalleryError::MissingField(_) | GalleryError::InvalidInput(_) => {
                AppError::bad_request(err.to_string())
            }
            GalleryError::NotFound(_) => AppError::not_found(err.to_string()),
            GalleryError::Forbidden(_) => AppError::new(StatusCode::FORBIDDEN, err.to_string()),
            GalleryError::Upload(_) => AppError::new(StatusCode::BAD_GATEWAY, err.to_string()),
            GalleryError::Sqlx(inner) => {
                tracing::error!(error = %inner, "metadata store failure");
                AppError::internal("database error")
            }
        }
    }
}
