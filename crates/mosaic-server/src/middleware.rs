//! HTTP middleware for authentication, rate limiting, etc.

use crate::auth::{extract_bearer_token, Credentials};
use crate::error::{ApiError, ErrorCode, REQUEST_ID};
use crate::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use governor::{state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};
use mosaic_core::CoreError;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Header carrying the request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Rate limiter type
pub type KeyedRateLimiter =
    RateLimiter<String, DefaultKeyedStateStore<String>, governor::clock::DefaultClock>;

/// Create a rate limiter; a zero rate is treated as one request per second
pub fn create_rate_limiter(requests_per_second: u32) -> Arc<KeyedRateLimiter> {
    let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::keyed(Quota::per_second(rate)))
}

/// Authentication middleware
///
/// Credentials are optional here; handlers decide whether they need a user
/// through the `CurrentUser` and `MaybeUser` extractors.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(extract_bearer_token)
        .map(str::to_string);

    let credentials = match token {
        None => Credentials::Missing,
        Some(token) => match state.catalog.resolve_user(&token).await {
            Ok(user) => Credentials::Verified(user),
            Err(CoreError::InvalidToken(reason)) => {
                tracing::debug!("Token validation failed: {}", reason);
                Credentials::Invalid("invalid or expired token".to_string())
            }
            Err(CoreError::Unauthorized(reason)) => Credentials::Invalid(reason),
            Err(e) => return Err(e.into()),
        },
    };

    request.extensions_mut().insert(credentials);
    Ok(next.run(request).await)
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<KeyedRateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    // Credentials are added by the auth middleware
    let key = request
        .extensions()
        .get::<Credentials>()
        .and_then(Credentials::user)
        .map(|user| user.id.to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    if limiter.check_key(&key).is_err() {
        return Err(ApiError::new(
            ErrorCode::SlowDown,
            "Please reduce your request rate",
        ));
    }

    Ok(next.run(request).await)
}

/// Request ID middleware
///
/// Reuses a well-formed incoming `x-request-id`, otherwise generates one. The
/// id is echoed in the response header and in error bodies.
pub async fn request_id_middleware(request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|id| !id.is_empty() && id.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut response = REQUEST_ID
        .scope(request_id.clone(), next.run(request))
        .await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        "Request completed"
    );

    response
}
