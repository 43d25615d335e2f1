//! Application state

use crate::config::{ObjectStoreKind, ServerConfig};
use anyhow::Context;
use mosaic_core::{Catalog, MemoryStore, PgStore, Store};
use mosaic_crypto::TokenService;
use mosaic_storage::{FlexibleObjectStore, MediaGateway, S3Config};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Application state shared across handlers
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Users, collections, images and their edges
    pub catalog: Catalog,
    /// Uploaded blobs
    pub media: MediaGateway<FlexibleObjectStore>,
}

impl AppState {
    /// Create a new application state
    pub async fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let tokens = Self::create_token_service(&config)?;

        let store: Arc<dyn Store> = match &config.database_url {
            Some(url) => {
                let store = PgStore::connect(url, config.database_max_connections)
                    .await
                    .context("failed to connect to PostgreSQL")?;
                info!("✓ Database: PostgreSQL (persistent)");
                Arc::new(store)
            }
            None => {
                warn!("⚠ Database: in-memory (NOT persistent - for development only)");
                Arc::new(MemoryStore::new())
            }
        };

        let objects = Self::create_object_store(&config).await?;
        if objects.is_persistent() {
            info!("✓ Object store: {} (persistent)", objects.kind());
        } else {
            warn!("⚠ Object store: in-memory (NOT persistent - for development only)");
        }

        let media = MediaGateway::new(objects, &config.media_bucket, config.public_base());
        // A store that is down at boot is retried on the first upload
        if let Err(e) = media.ensure_bucket(&config.media_bucket).await {
            warn!("Could not prepare bucket {}: {}", config.media_bucket, e);
        }

        Ok(Self::from_parts(config, Catalog::new(store, tokens), media))
    }

    /// State over an already built catalog and gateway
    pub fn from_parts(
        config: ServerConfig,
        catalog: Catalog,
        media: MediaGateway<FlexibleObjectStore>,
    ) -> Self {
        Self {
            config,
            catalog,
            media,
        }
    }

    fn create_token_service(config: &ServerConfig) -> anyhow::Result<TokenService> {
        let validity = chrono::Duration::hours(config.token_validity_hours.max(1));
        match (&config.jwt_secret, config.dev_secret) {
            (Some(secret), _) if !secret.is_empty() => {
                Ok(TokenService::with_validity(secret.as_bytes(), validity))
            }
            (_, true) => {
                warn!("⚠ Using a random signing secret - tokens will not survive a restart");
                let secret = format!("{}{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4());
                Ok(TokenService::with_validity(secret.as_bytes(), validity))
            }
            _ => anyhow::bail!("a JWT secret is required (set MOSAIC_JWT_SECRET or --dev-secret)"),
        }
    }

    async fn create_object_store(config: &ServerConfig) -> anyhow::Result<FlexibleObjectStore> {
        Ok(match config.object_store {
            ObjectStoreKind::Memory => FlexibleObjectStore::memory(),
            ObjectStoreKind::Fs => {
                FlexibleObjectStore::filesystem_or_memory(&config.objects_root).await
            }
            ObjectStoreKind::S3 => {
                let s3 = S3Config {
                    endpoint: config.s3_url(),
                    access_key: config.s3_access_key.clone(),
                    secret_key: config.s3_secret_key.clone(),
                    region: config.s3_region.clone(),
                    timeout: Duration::from_secs(30),
                };
                info!("Object store endpoint: {}", s3.endpoint);
                FlexibleObjectStore::s3(s3).context("invalid S3 configuration")?
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_storage::ObjectStore;

    #[tokio::test]
    async fn test_new_requires_secret() {
        let result = AppState::new(ServerConfig::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_new_with_dev_secret() {
        let config = ServerConfig {
            dev_secret: true,
            ..Default::default()
        };
        let state = AppState::new(config).await.unwrap();
        assert_eq!(state.media.bucket(), "media");
        assert!(state.media.store().bucket_exists("media").await.unwrap());
    }

    #[tokio::test]
    async fn test_filesystem_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            jwt_secret: Some("secret".to_string()),
            object_store: ObjectStoreKind::Fs,
            objects_root: dir.path().to_path_buf(),
            ..Default::default()
        };
        let state = AppState::new(config).await.unwrap();
        assert!(state.media.store().is_persistent());
        assert!(dir.path().join("media").is_dir());
    }
}
