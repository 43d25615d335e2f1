//! Image upload, feed and lookup

use super::form::FormData;
use super::{discard_blobs, Ack, Created};
use crate::auth::CurrentUser;
use crate::{ApiError, AppState};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use mosaic_core::{Image, ImageUpload, TagCount};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Feed size when no limit is given
pub const DEFAULT_FEED_LIMIT: u64 = 100;

/// Number of tags returned by the tag listing
pub const DEFAULT_TAG_LIMIT: u64 = 30;

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteImageRequest {
    pub image_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub tags: Vec<TagCount>,
}

/// GET /media - Newest images
pub async fn latest_media(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(params), _): WithRejection<Query<LimitParams>, ApiError>,
) -> Result<Json<Vec<Image>>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_FEED_LIMIT);
    Ok(Json(state.catalog.latest_images(limit).await?))
}

/// POST /media - Upload an image into a collection
///
/// Multipart fields: `image` file, `title`, `desc`, `tags` (JSON array) and
/// `collection`. The collection is created on first use.
pub async fn upload_media(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    WithRejection(multipart, _): WithRejection<Multipart, ApiError>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    let mut form = FormData::read(multipart).await?;

    let image = form
        .take_file("image")
        .ok_or_else(|| ApiError::validation("image is required"))?;
    let title = form.require("title")?.to_string();
    let collection = form.require("collection")?.to_string();
    let tags = form.string_list("tags")?;
    let desc = form.owned_text("desc");

    let hash = mosaic_crypto::content_hash(&image.data);
    let url = state
        .media
        .upload(image.data, image.filename.as_deref())
        .await?;

    let upload = ImageUpload {
        url: url.clone(),
        title,
        desc,
        hash: Some(hash),
        tags,
        collection,
    };

    match state.catalog.upload_image(upload, user.id).await {
        Ok(image) => Ok((StatusCode::CREATED, Json(Created { id: image.id }))),
        Err(e) => {
            discard_blobs(&state, Some(url.as_str())).await;
            Err(e.into())
        }
    }
}

/// DELETE /media - Delete an image owned by the caller
pub async fn delete_media(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    WithRejection(Json(body), _): WithRejection<Json<DeleteImageRequest>, ApiError>,
) -> Result<Json<Ack>, ApiError> {
    let image = state.catalog.delete_image(body.image_id, user.id).await?;
    discard_blobs(&state, Some(image.url.as_str())).await;
    Ok(Json(Ack::ok("Image deleted successfully")))
}

/// GET /media/{id} - One image
pub async fn get_media(
    State(state): State<Arc<AppState>>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<Image>, ApiError> {
    Ok(Json(state.catalog.image(id).await?))
}

/// GET /media/tags - Most used tags with their counts
pub async fn popular_tags(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(params), _): WithRejection<Query<LimitParams>, ApiError>,
) -> Result<Json<TagsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_TAG_LIMIT);
    let tags = state.catalog.popular_tags(limit).await?;
    Ok(Json(TagsResponse { tags }))
}
