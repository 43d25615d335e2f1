//! Service-level handlers

use axum::{http::StatusCode, response::IntoResponse};

/// GET /health - Health check
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Fallback for unknown routes
pub async fn route_not_found(uri: axum::http::Uri) -> crate::ApiError {
    crate::ApiError::new(
        crate::ErrorCode::NotFound,
        format!("no route for {}", uri.path()),
    )
}
