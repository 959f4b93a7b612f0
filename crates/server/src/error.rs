//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// API error response body. The v1 client branches on the status code and
/// surfaces the `error` field to the user.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// API error type.
///
/// The status codes are load-bearing: the v1 client decides what to do next
/// based on them, so each kind maps to exactly one code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication required: {0}")]
    Unauthenticated(String),

    #[error("unknown credentials for user {0}")]
    Forbidden(String),

    #[error("access denied: {0}")]
    Unauthorized(String),

    #[error("credential lookup failed: {0}")]
    LookupError(String),

    #[error("namespace mismatch: {0}")]
    NamespaceMismatch(String),

    #[error("repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("malformed body: {0}")]
    MalformedBody(String),

    #[error("image layer upload not complete: {0}")]
    IncompleteUpload(String),

    #[error("image checksum not verified: {0}")]
    ChecksumPending(String),

    #[error("failed to persist completion: {0}")]
    PersistError(String),

    #[error("ancestry cycle detected at {0}")]
    CycleDetected(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Storage(#[from] capstan_storage::StorageError),

    #[error("metadata error: {0}")]
    Metadata(#[from] capstan_metadata::MetadataError),

    #[error("core error: {0}")]
    Core(#[from] capstan_core::Error),
}

impl ApiError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) | Self::Unauthorized(_) | Self::LookupError(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NamespaceMismatch(_)
            | Self::MalformedBody(_)
            | Self::IncompleteUpload(_)
            | Self::ChecksumPending(_)
            | Self::PersistError(_)
            | Self::CycleDetected(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RepositoryNotFound(_) | Self::ImageNotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(e) => match e {
                capstan_storage::StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Metadata(e) => match e {
                capstan_metadata::MetadataError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Core(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_load_bearing() {
        assert_eq!(
            ApiError::Unauthenticated(String::new()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden(String::new()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NamespaceMismatch(String::new()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::RepositoryNotFound(String::new()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::ImageNotFound(String::new()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::IncompleteUpload(String::new()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::ChecksumPending(String::new()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::PersistError(String::new()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn error_body_uses_the_v1_shape() {
        let body = serde_json::to_value(ErrorResponse {
            error: "nope".to_string(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"error": "nope"}));
    }
}
