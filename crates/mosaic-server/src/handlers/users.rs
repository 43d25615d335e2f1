//! User accounts, profiles and follow edges

use super::form::FormData;
use super::{discard_blobs, Ack, Created};
use crate::auth::{CurrentUser, MaybeUser};
use crate::{ApiError, AppState};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use mosaic_core::{Collection, Image, Profile, Signup, UserUpdate};
use std::sync::Arc;

/// POST /users - Sign up
pub async fn signup(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(signup), _): WithRejection<Json<Signup>, ApiError>,
) -> Result<(StatusCode, Json<Ack>), ApiError> {
    state.catalog.create_user(signup).await?;
    Ok((StatusCode::CREATED, Json(Ack::ok("User created successfully"))))
}

/// PUT /users - Update the caller's profile
///
/// Multipart fields: `name`, `username`, `password`, `bio` and an `avatar`
/// file. Blank fields are left unchanged.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    WithRejection(multipart, _): WithRejection<Multipart, ApiError>,
) -> Result<Json<Ack>, ApiError> {
    let mut form = FormData::read(multipart).await?;

    let avatar = match form.take_file("avatar") {
        Some(file) => Some(
            state
                .media
                .upload(file.data, file.filename.as_deref())
                .await?,
        ),
        None => None,
    };

    let update = UserUpdate {
        name: form.owned_text("name"),
        username: form.owned_text("username"),
        password: form.owned_text("password"),
        bio: form.owned_text("bio"),
        avatar: avatar.clone(),
    };

    match state.catalog.update_user(user.id, user.id, update).await {
        Ok(updated) => {
            // The replaced avatar is ours to clean up
            if avatar.is_some() && updated.avatar != user.avatar {
                discard_blobs(&state, user.avatar.as_deref()).await;
            }
            Ok(Json(Ack::ok("User updated successfully")))
        }
        Err(e) => {
            discard_blobs(&state, avatar.as_deref()).await;
            Err(e.into())
        }
    }
}

/// GET /users/{username} - Profile; `me` is the caller
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    viewer: MaybeUser,
    Path(username): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    let username = viewer.resolve_alias(&username)?;
    let profile = state.catalog.profile(&username, viewer.id()).await?;
    Ok(Json(profile))
}

/// POST /users/{username}/followers - Follow a user
pub async fn follow_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    let edge = state.catalog.follow(&username, user.id).await?;
    let status = if edge.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(Created { id: edge.id })))
}

/// DELETE /users/{username}/followers - Unfollow a user
pub async fn unfollow_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    state.catalog.unfollow(&username, user.id).await?;
    Ok(Json(Ack::ok(format!("Unfollowed {}", username))))
}

/// GET /users/{username}/cluster - Collections owned by a user
pub async fn user_clusters(
    State(state): State<Arc<AppState>>,
    viewer: MaybeUser,
    Path(username): Path<String>,
) -> Result<Json<Vec<Collection>>, ApiError> {
    let username = viewer.resolve_alias(&username)?;
    Ok(Json(state.catalog.user_clusters(&username).await?))
}

/// GET /users/{username}/cluster/{title} - Images in one of a user's collections
pub async fn user_cluster_images(
    State(state): State<Arc<AppState>>,
    viewer: MaybeUser,
    Path((username, title)): Path<(String, String)>,
) -> Result<Json<Vec<Image>>, ApiError> {
    let username = viewer.resolve_alias(&username)?;
    Ok(Json(
        state.catalog.user_cluster_images(&username, &title).await?,
    ))
}
