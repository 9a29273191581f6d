use crate::services::UploadError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for handler errors that keeps the message local.
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

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
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
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

/// Map engine errors onto HTTP statuses. Retryable storage failures are
/// plain 500s; conflicts that require a client decision are 409s.
impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        let status = match &err {
            UploadError::InvalidArgument(_) | UploadError::OutOfRange { .. } => {
                StatusCode::BAD_REQUEST
            }
            UploadError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            UploadError::Forbidden(_) => StatusCode::FORBIDDEN,
            UploadError::ChecksumConflict { .. }
            | UploadError::SessionAlreadyCompleted(_)
            | UploadError::IncompleteUpload { .. }
            | UploadError::InvalidTransition { .. } => StatusCode::CONFLICT,
            UploadError::MergeTimeout(_) | UploadError::Sqlx(_) | UploadError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn upload_errors_map_to_expected_statuses() {
        let id = Uuid::new_v4();
        let cases = [
            (
                AppError::from(UploadError::InvalidArgument("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(UploadError::SessionNotFound(id)),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::from(UploadError::Forbidden(id)),
                StatusCode::FORBIDDEN,
            ),
            (
                AppError::from(UploadError::ChecksumConflict { index: 2 }),
                StatusCode::CONFLICT,
            ),
            (
                AppError::from(UploadError::MergeTimeout(id)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status, status, "{}", err.message);
        }
    }
}
