//! Collection ("cluster") handlers

use super::form::FormData;
use super::{discard_blobs, Ack, Created};
use crate::auth::{CurrentUser, MaybeUser};
use crate::{ApiError, AppState};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use mosaic_core::{Collection, CollectionView, Image};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    10
}

#[derive(Debug, Deserialize)]
pub struct ListClustersParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        Self {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit.max(1)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClusterPage {
    pub data: Vec<Collection>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct DeleteClusterRequest {
    pub title: String,
}

/// GET /clusters - Paginated collections, newest first
pub async fn list_clusters(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(params), _): WithRejection<Query<ListClustersParams>, ApiError>,
) -> Result<Json<ClusterPage>, ApiError> {
    let page = state
        .catalog
        .list_clusters(params.page, params.limit)
        .await?;

    Ok(Json(ClusterPage {
        data: page.data,
        pagination: Pagination::new(params.page, params.limit, page.total),
    }))
}

/// POST /clusters - Create a collection
///
/// Multipart fields: `title`, `desc` and an optional `thumbnail` file.
pub async fn create_cluster(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    WithRejection(multipart, _): WithRejection<Multipart, ApiError>,
) -> Result<(StatusCode, Json<Collection>), ApiError> {
    let mut form = FormData::read(multipart).await?;
    let title = form.require("title")?.to_string();
    let desc = form.owned_text("desc");

    let thumbnail = match form.take_file("thumbnail") {
        Some(file) => Some(
            state
                .media
                .upload(file.data, file.filename.as_deref())
                .await?,
        ),
        None => None,
    };

    match state
        .catalog
        .create_collection(&title, desc, thumbnail.clone(), user.id)
        .await
    {
        Ok(collection) => Ok((StatusCode::CREATED, Json(collection))),
        Err(e) => {
            discard_blobs(&state, thumbnail.as_deref()).await;
            Err(e.into())
        }
    }
}

/// DELETE /clusters - Delete a collection owned by the caller
pub async fn delete_cluster(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    WithRejection(Json(body), _): WithRejection<Json<DeleteClusterRequest>, ApiError>,
) -> Result<Json<Ack>, ApiError> {
    let removed = state
        .catalog
        .delete_collection(&body.title, user.id)
        .await?;

    let urls: Vec<&str> = removed.iter().map(|image| image.url.as_str()).collect();
    discard_blobs(&state, urls).await;

    Ok(Json(Ack::ok(format!(
        "Collection deleted with {} images",
        removed.len()
    ))))
}

/// GET /clusters/{title} - Collection details for the (optional) viewer
pub async fn get_cluster(
    State(state): State<Arc<AppState>>,
    viewer: MaybeUser,
    Path(title): Path<String>,
) -> Result<Json<CollectionView>, ApiError> {
    Ok(Json(state.catalog.cluster(&title, viewer.id()).await?))
}

/// GET /clusters/{title}/images - Images in a collection
pub async fn cluster_images(
    State(state): State<Arc<AppState>>,
    Path(title): Path<String>,
) -> Result<Json<Vec<Image>>, ApiError> {
    Ok(Json(state.catalog.cluster_images(&title).await?))
}

/// POST /clusters/{title}/followers - Follow a collection
pub async fn follow_cluster(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(title): Path<String>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    let edge = state.catalog.follow_collection(&title, user.id).await?;
    let status = if edge.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(Created { id: edge.id })))
}

/// DELETE /clusters/{title}/followers - Unfollow a collection
pub async fn unfollow_cluster(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(title): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    state.catalog.unfollow_collection(&title, user.id).await?;
    Ok(Json(Ack::ok(format!("Unfollowed {}", title))))
}
