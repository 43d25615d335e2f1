//! Login and token validation

use crate::auth::BearerToken;
use crate::{ApiError, AppState, ErrorCode};
use axum::{extract::State, Json};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Utc};
use mosaic_core::{CoreError, UserSession};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: UserSession,
}

/// POST /auth - Exchange credentials for a bearer token
pub async fn login(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(body), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<Json<LoginResponse>, ApiError> {
    let issued = state
        .catalog
        .authenticate(&body.username, &body.password)
        .await
        .map_err(|e| match e {
            // Same answer for unknown user and wrong password
            CoreError::UserNotFound(_) | CoreError::InvalidPassword => {
                ApiError::new(ErrorCode::InvalidCredentials, "invalid username or password")
            }
            other => other.into(),
        })?;

    tracing::info!(username = %body.username, "User logged in");

    Ok(Json(LoginResponse {
        token: issued.token,
        token_type: "Bearer",
        expires_at: issued.expires_at,
    }))
}

/// POST /auth/validate - Resolve a bearer token to its session
pub async fn validate_token(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.catalog.resolve_token(&token).await?;
    Ok(Json(SessionResponse { session }))
}
