//! Public blob reads for the local object-store backends

use crate::error::ErrorCode;
use crate::{ApiError, AppState};
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// GET /objects/{bucket}/{*key} - Raw blob with its content type
///
/// Only the media bucket is readable, and only when this process holds the
/// blobs. An S3 backend serves its public URLs itself.
pub async fn get_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    if !state.media.store().is_local() {
        return Err(ApiError::new(
            ErrorCode::NotFound,
            format!("object not found: {}/{}", bucket, key),
        ));
    }

    let object = state.media.fetch(&bucket, &key).await?;

    Ok((
        [
            (header::CONTENT_TYPE, object.content_type),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        object.data,
    )
        .into_response())
}
