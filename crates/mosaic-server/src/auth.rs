//! Authentication and request identity

use crate::error::{ApiError, ErrorCode};
use axum::{extract::FromRequestParts, http::request::Parts};
use mosaic_core::User;

/// Path segment that stands for the authenticated user
pub const SELF_ALIAS: &str = "me";

/// Outcome of reading the `Authorization` header, stored in request
/// extensions by the auth middleware
#[derive(Clone, Debug)]
pub enum Credentials {
    /// No bearer token was sent
    Missing,
    /// A token was sent but failed verification or its user is gone
    Invalid(String),
    /// The token resolved to a user
    Verified(User),
}

impl Credentials {
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Verified(user) => Some(user),
            _ => None,
        }
    }
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn credentials(parts: &Parts) -> Credentials {
    parts
        .extensions
        .get::<Credentials>()
        .cloned()
        .unwrap_or(Credentials::Missing)
}

/// The authenticated user; rejects with 401 when there is none
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match credentials(parts) {
            Credentials::Verified(user) => Ok(Self(user)),
            Credentials::Invalid(reason) => Err(ApiError::new(ErrorCode::InvalidToken, reason)),
            Credentials::Missing => Err(ApiError::unauthorized("authentication required")),
        }
    }
}

/// The authenticated user if a valid token was sent
#[derive(Clone, Debug)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn id(&self) -> Option<uuid::Uuid> {
        self.0.as_ref().map(|user| user.id)
    }

    /// Replace the `me` alias with the caller's username
    pub fn resolve_alias(&self, username: &str) -> Result<String, ApiError> {
        if username != SELF_ALIAS {
            return Ok(username.to_string());
        }
        self.0
            .as_ref()
            .map(|user| user.username.clone())
            .ok_or_else(|| ApiError::unauthorized("authentication required for /me"))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(credentials(parts).user().cloned()))
    }
}

/// The raw bearer token; rejects with 401 when none was sent
#[derive(Clone, Debug)]
pub struct BearerToken(pub String);

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(extract_bearer_token)
            .map(|token| Self(token.to_string()))
            .ok_or_else(|| ApiError::unauthorized("bearer token required"))
    }
}
