//! Full-text image search

use crate::{ApiError, AppState};
use axum::{
    extract::{Query, State},
    Json,
};
use axum_extra::extract::WithRejection;
use mosaic_core::Image;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
}

/// GET /search?query= - Images matching every term
pub async fn search_media(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(params), _): WithRejection<Query<SearchParams>, ApiError>,
) -> Result<Json<Vec<Image>>, ApiError> {
    let results = state.catalog.search_images(&params.query).await?;
    tracing::debug!(query = %params.query, hits = results.len(), "Search");
    Ok(Json(results))
}
