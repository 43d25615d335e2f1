//! HTTP route definitions

use crate::{handlers, middleware, AppState};
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main router
pub fn create_router(state: Arc<AppState>) -> Router {
    // Create rate limiter
    let rate_limiter = middleware::create_rate_limiter(state.config.rate_limit_rps);

    let mut router = Router::new()
        // Service endpoints
        .route("/health", get(handlers::health_check))

        // Auth endpoints
        .route("/auth", post(handlers::login))
        .route("/auth/validate", post(handlers::validate_token))

        // User endpoints
        .route(
            "/users",
            post(handlers::signup).put(handlers::update_user),
        )
        .route("/users/{username}", get(handlers::get_profile))
        .route(
            "/users/{username}/followers",
            post(handlers::follow_user).delete(handlers::unfollow_user),
        )
        .route("/users/{username}/cluster", get(handlers::user_clusters))
        .route(
            "/users/{username}/cluster/{title}",
            get(handlers::user_cluster_images),
        )

        // Collection endpoints
        .route(
            "/clusters",
            get(handlers::list_clusters)
                .post(handlers::create_cluster)
                .delete(handlers::delete_cluster),
        )
        .route("/clusters/{title}", get(handlers::get_cluster))
        .route("/clusters/{title}/images", get(handlers::cluster_images))
        .route(
            "/clusters/{title}/followers",
            post(handlers::follow_cluster).delete(handlers::unfollow_cluster),
        )

        // Media endpoints
        .route(
            "/media",
            get(handlers::latest_media)
                .post(handlers::upload_media)
                .delete(handlers::delete_media),
        )
        .route("/media/tags", get(handlers::popular_tags))
        .route("/media/{id}", get(handlers::get_media))
        .route("/search", get(handlers::search_media))

        // Blob endpoint
        .route("/objects/{bucket}/{*key}", get(handlers::get_object))
        .fallback(handlers::route_not_found)

        // Apply middleware; the request id layer is outermost so every
        // rejection below it carries the id
        .layer(axum_middleware::from_fn_with_state(
            rate_limiter,
            middleware::rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::auth_middleware,
        ))
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware));

    if state.config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(Any);
        router = router.layer(cors);
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServerConfig;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use bytes::Bytes;
    use mosaic_core::{Catalog, MemoryStore};
    use mosaic_crypto::TokenService;
    use mosaic_storage::{FlexibleObjectStore, MediaGateway, ObjectStore, S3Config};
    use tower::ServiceExt;

    async fn router() -> Router {
        let config = ServerConfig {
            jwt_secret: Some("router-test-secret".to_string()),
            ..Default::default()
        };
        create_router(Arc::new(AppState::new(config).await.unwrap()))
    }

    #[tokio::test]
    async fn test_health_route() {
        let response = router()
            .await
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_protected_route_without_token() {
        let response = router()
            .await
            .oneshot(
                Request::delete("/media")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"image_id":"00000000-0000-0000-0000-000000000000"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["code"], "Unauthorized");
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected_on_protected_routes() {
        let response = router()
            .await
            .oneshot(
                Request::post("/users/bob/followers")
                    .header("authorization", "Bearer not.a.token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["code"], "InvalidToken");
    }

    fn state_over(objects: FlexibleObjectStore) -> Arc<AppState> {
        let catalog = Catalog::new(
            Arc::new(MemoryStore::new()),
            TokenService::new(b"router-test-secret"),
        );
        let media = MediaGateway::new(objects, "media", "http://localhost:8000/objects");
        Arc::new(AppState::from_parts(ServerConfig::default(), catalog, media))
    }

    async fn status_of(state: Arc<AppState>, uri: &str) -> StatusCode {
        create_router(state)
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_objects_route_serves_only_media_bucket() {
        let objects = FlexibleObjectStore::memory();
        for bucket in ["media", "private-backups"] {
            objects.create_bucket(bucket).await.unwrap();
            objects
                .put_object(bucket, "note.txt", Bytes::from_static(b"hi"), "text/plain")
                .await
                .unwrap();
        }
        let state = state_over(objects);

        assert_eq!(
            status_of(state.clone(), "/objects/media/note.txt").await,
            StatusCode::OK
        );
        assert_eq!(
            status_of(state, "/objects/private-backups/note.txt").await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_objects_route_is_closed_for_s3_backend() {
        let objects = FlexibleObjectStore::s3(S3Config {
            endpoint: "http://127.0.0.1:9".to_string(),
            access_key: "access".to_string(),
            secret_key: "secret".to_string(),
            region: "us-east-1".to_string(),
            timeout: std::time::Duration::from_secs(1),
        })
        .unwrap();

        assert_eq!(
            status_of(state_over(objects), "/objects/media/photo.png").await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_tags_route_is_not_an_image_id() {
        let response = router()
            .await
            .oneshot(Request::get("/media/tags").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
