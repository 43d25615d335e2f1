//! Backend selection at startup

use crate::{
    FsObjectStore, MemoryObjectStore, ObjectStore, Result, S3Config, S3ObjectStore, StoredObject,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tracing::{info, warn};

/// Object store that can be any of the supported backends
#[derive(Clone, Debug)]
pub enum FlexibleObjectStore {
    /// S3-compatible server
    S3(S3ObjectStore),
    /// Local directory tree
    Filesystem(FsObjectStore),
    /// In-memory storage (fallback)
    Memory(MemoryObjectStore),
}

impl FlexibleObjectStore {
    /// Connect to an S3-compatible server
    pub fn s3(config: S3Config) -> Result<Self> {
        info!(endpoint = %config.endpoint, "Using S3-compatible object store");
        Ok(Self::S3(S3ObjectStore::new(config)?))
    }

    /// Use a directory, falling back to memory if it cannot be created
    pub async fn filesystem_or_memory(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        match FsObjectStore::new(&root).await {
            Ok(store) => {
                info!(root = %root.display(), "Using filesystem object store");
                Self::Filesystem(store)
            }
            Err(e) => {
                warn!(error = %e, "Failed to open object directory, using in-memory storage");
                Self::Memory(MemoryObjectStore::new())
            }
        }
    }

    /// In-memory store
    pub fn memory() -> Self {
        Self::Memory(MemoryObjectStore::new())
    }

    /// Check if objects survive a restart
    pub fn is_persistent(&self) -> bool {
        !matches!(self, Self::Memory(_))
    }

    /// Whether blobs must be served by this process rather than the store itself
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::S3(_))
    }

    /// Backend name for logs and health output
    pub fn kind(&self) -> &'static str {
        match self {
            Self::S3(_) => "s3",
            Self::Filesystem(_) => "filesystem",
            Self::Memory(_) => "memory",
        }
    }
}

#[async_trait]
impl ObjectStore for FlexibleObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self {
            Self::S3(store) => store.bucket_exists(bucket).await,
            Self::Filesystem(store) => store.bucket_exists(bucket).await,
            Self::Memory(store) => store.bucket_exists(bucket).await,
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        match self {
            Self::S3(store) => store.create_bucket(bucket).await,
            Self::Filesystem(store) => store.create_bucket(bucket).await,
            Self::Memory(store) => store.create_bucket(bucket).await,
        }
    }

    async fn set_public_read(&self, bucket: &str) -> Result<()> {
        match self {
            Self::S3(store) => store.set_public_read(bucket).await,
            Self::Filesystem(store) => store.set_public_read(bucket).await,
            Self::Memory(store) => store.set_public_read(bucket).await,
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<()> {
        match self {
            Self::S3(store) => store.put_object(bucket, key, data, content_type).await,
            Self::Filesystem(store) => store.put_object(bucket, key, data, content_type).await,
            Self::Memory(store) => store.put_object(bucket, key, data, content_type).await,
        }
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject> {
        match self {
            Self::S3(store) => store.get_object(bucket, key).await,
            Self::Filesystem(store) => store.get_object(bucket, key).await,
            Self::Memory(store) => store.get_object(bucket, key).await,
        }
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        match self {
            Self::S3(store) => store.delete_object(bucket, key).await,
            Self::Filesystem(store) => store.delete_object(bucket, key).await,
            Self::Memory(store) => store.delete_object(bucket, key).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_backend_flags() {
        let memory = FlexibleObjectStore::memory();
        assert!(!memory.is_persistent());
        assert!(memory.is_local());
        assert_eq!(memory.kind(), "memory");

        let dir = TempDir::new().unwrap();
        let fs = FlexibleObjectStore::filesystem_or_memory(dir.path()).await;
        assert!(fs.is_persistent());
        assert_eq!(fs.kind(), "filesystem");

        let s3 = FlexibleObjectStore::s3(S3Config::default()).unwrap();
        assert!(!s3.is_local());
    }

    #[tokio::test]
    async fn test_delegates_to_backend() {
        let store = FlexibleObjectStore::memory();
        store.create_bucket("media").await.unwrap();
        store
            .put_object("media", "k.txt", Bytes::from_static(b"hi"), "text/plain")
            .await
            .unwrap();
        let object = store.get_object("media", "k.txt").await.unwrap();
        assert_eq!(object.data.as_ref(), b"hi");
    }
}
