//! Error types and stable error codes

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mosaic_core::CoreError;
use mosaic_storage::StorageError;
use serde_json::json;
use thiserror::Error;

tokio::task_local! {
    /// Request id of the request being served, set by the request-id middleware
    pub static REQUEST_ID: String;
}

/// Current request id, or a fresh one outside a request scope
pub fn current_request_id() -> String {
    REQUEST_ID
        .try_with(Clone::clone)
        .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string())
}

/// Machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ValidationError,
    Unauthorized,
    InvalidToken,
    InvalidCredentials,
    NotFound,
    DuplicateUsername,
    DuplicateResource,
    EntityTooLarge,
    StorageError,
    SlowDown,
    InternalError,
}

impl ErrorCode {
    /// Get the error code string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "ValidationError",
            Self::Unauthorized => "Unauthorized",
            Self::InvalidToken => "InvalidToken",
            Self::InvalidCredentials => "InvalidCredentials",
            Self::NotFound => "NotFound",
            Self::DuplicateUsername => "DuplicateUsername",
            Self::DuplicateResource => "DuplicateResource",
            Self::EntityTooLarge => "EntityTooLarge",
            Self::StorageError => "StorageError",
            Self::SlowDown => "SlowDown",
            Self::InternalError => "InternalError",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError => StatusCode::BAD_REQUEST,
            Self::Unauthorized | Self::InvalidToken | Self::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::DuplicateUsername | Self::DuplicateResource => StatusCode::CONFLICT,
            Self::EntityTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::StorageError => StatusCode::BAD_GATEWAY,
            Self::SlowDown => StatusCode::TOO_MANY_REQUESTS,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    Api { code: ErrorCode, message: String },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Create an error with an explicit code
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Get the error code
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Api { code, .. } => *code,
            Self::Internal(_) => ErrorCode::InternalError,
            Self::Core(e) => match e {
                CoreError::Validation(_) => ErrorCode::ValidationError,
                CoreError::DuplicateUsername(_) => ErrorCode::DuplicateUsername,
                CoreError::DuplicateResource { .. } => ErrorCode::DuplicateResource,
                CoreError::UserNotFound(_)
                | CoreError::NotFound { .. }
                | CoreError::EdgeNotFound(_) => ErrorCode::NotFound,
                CoreError::InvalidPassword => ErrorCode::InvalidCredentials,
                CoreError::InvalidToken(_) => ErrorCode::InvalidToken,
                CoreError::Unauthorized(_) => ErrorCode::Unauthorized,
                CoreError::Crypto(_) | CoreError::Database(_) => ErrorCode::InternalError,
            },
            Self::Storage(e) => match e {
                e if e.is_not_found() => ErrorCode::NotFound,
                StorageError::InvalidBucketName(_)
                | StorageError::InvalidObjectKey(_)
                | StorageError::EmptyContent => ErrorCode::ValidationError,
                _ => ErrorCode::StorageError,
            },
        }
    }

    /// Message safe to show a client
    fn public_message(&self) -> String {
        match self.error_code() {
            ErrorCode::InternalError => "internal server error".to_string(),
            ErrorCode::StorageError => "object storage request failed".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::new(ErrorCode::EntityTooLarge, err.body_text())
        } else {
            Self::validation(err.body_text())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.error_code();
        let status = code.status_code();
        let request_id = current_request_id();

        match code {
            ErrorCode::InternalError | ErrorCode::StorageError => {
                tracing::error!(error = %self, request_id = %request_id, "Request failed")
            }
            _ => tracing::debug!(error = %self, code = code.as_str(), "Request rejected"),
        }

        let body = json!({
            "success": false,
            "code": code.as_str(),
            "message": self.public_message(),
            "request_id": request_id,
        });

        (status, Json(body)).into_response()
    }
}
