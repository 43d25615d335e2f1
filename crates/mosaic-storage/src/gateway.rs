//! Media upload gateway
//!
//! Wraps an [`ObjectStore`] with the media bucket, key generation and public
//! URL construction used by the request handlers.

use crate::{
    content_type_for, validate_bucket_name, validate_object_key, FlexibleObjectStore,
    ObjectStore, Result, StorageError, StoredObject,
};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Default media bucket
pub const DEFAULT_BUCKET: &str = "media";

/// Extension used for generated keys when no filename is supplied
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Uploads blobs into a single public bucket and hands back their URLs
#[derive(Clone, Debug)]
pub struct MediaGateway<S = FlexibleObjectStore> {
    store: S,
    bucket: String,
    public_base: String,
    bucket_ready: Arc<AtomicBool>,
}

impl<S: ObjectStore> MediaGateway<S> {
    /// Create a gateway for `bucket`, publishing URLs under `public_base`
    pub fn new(store: S, bucket: impl Into<String>, public_base: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            public_base: public_base.into().trim_end_matches('/').to_string(),
            bucket_ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Media bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Make sure `name` exists and is publicly readable.
    ///
    /// Losing a creation race to another caller counts as success.
    #[instrument(skip(self))]
    pub async fn ensure_bucket(&self, name: &str) -> Result<()> {
        validate_bucket_name(name)?;

        if self.store.bucket_exists(name).await? {
            return Ok(());
        }

        match self.store.create_bucket(name).await {
            Ok(()) => {
                self.store.set_public_read(name).await?;
                info!(bucket = name, "Created public bucket");
                Ok(())
            }
            Err(StorageError::BucketAlreadyExists(_)) => {
                debug!(bucket = name, "Bucket created concurrently");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn ensure_media_bucket(&self) -> Result<()> {
        if self.bucket_ready.load(Ordering::Acquire) {
            return Ok(());
        }
        self.ensure_bucket(&self.bucket).await?;
        self.bucket_ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Store a blob and return its public URL
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn upload(&self, data: Bytes, filename: Option<&str>) -> Result<String> {
        if data.is_empty() {
            return Err(StorageError::EmptyContent);
        }

        self.ensure_media_bucket().await?;

        let key = object_key(filename);
        let content_type = content_type_for(&key);

        self.store
            .put_object(&self.bucket, &key, data, &content_type)
            .await
            .map_err(|e| {
                warn!(error = %e, key = %key, "Upload failed");
                e
            })?;

        Ok(self.object_url(&key))
    }

    /// Public URL for a key in the media bucket
    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_base, self.bucket, key)
    }

    /// Key in the media bucket for a URL produced by this gateway
    pub fn key_for_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        let prefix = format!("{}/{}/", self.public_base, self.bucket);
        url.strip_prefix(prefix.as_str()).filter(|key| !key.is_empty())
    }

    /// Read a blob from the media bucket; other buckets are reported missing
    pub async fn fetch(&self, bucket: &str, key: &str) -> Result<StoredObject> {
        validate_bucket_name(bucket)?;
        if bucket != self.bucket {
            return Err(StorageError::BucketNotFound(bucket.to_string()));
        }
        validate_object_key(key)?;
        self.store.get_object(bucket, key).await
    }

    /// Delete the blob behind a URL; URLs pointing elsewhere are left alone.
    ///
    /// Returns whether a delete was issued.
    pub async fn remove_url(&self, url: &str) -> Result<bool> {
        match self.key_for_url(url) {
            Some(key) => {
                self.store.delete_object(&self.bucket, key).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Build an object key: `<uuid>.jpg`, or `<uuid>-<sanitized filename>`
pub fn object_key(filename: Option<&str>) -> String {
    let id = Uuid::new_v4();
    match filename.map(sanitize_filename).filter(|name| !name.is_empty()) {
        Some(name) => format!("{}-{}", id, name),
        None => format!("{}.{}", id, DEFAULT_EXTENSION),
    }
}

fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    cleaned.trim_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryObjectStore;
    use rstest::rstest;

    fn gateway() -> MediaGateway<MemoryObjectStore> {
        MediaGateway::new(MemoryObjectStore::new(), "media", "http://localhost:8000/objects/")
    }

    #[tokio::test]
    async fn test_ensure_bucket_idempotent() {
        let gateway = gateway();
        gateway.ensure_bucket("media").await.unwrap();
        gateway.ensure_bucket("media").await.unwrap();
        assert!(gateway.store().is_public("media"));
    }

    #[tokio::test]
    async fn test_ensure_bucket_concurrent() {
        let gateway = gateway();
        let (a, b) = tokio::join!(gateway.ensure_bucket("media"), gateway.ensure_bucket("media"));
        assert!(a.is_ok());
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_upload_generated_name() {
        let gateway = gateway();
        let url = gateway.upload(Bytes::from_static(b"jpeg"), None).await.unwrap();

        assert!(url.starts_with("http://localhost:8000/objects/media/"));
        assert!(url.ends_with(".jpg"));

        let key = gateway.key_for_url(&url).unwrap();
        let object = gateway.fetch("media", key).await.unwrap();
        assert_eq!(object.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_upload_named_file() {
        let gateway = gateway();
        let url = gateway
            .upload(Bytes::from_static(b"png"), Some("my sunset.png"))
            .await
            .unwrap();
        assert!(url.ends_with("-my-sunset.png"));

        let key = gateway.key_for_url(&url).unwrap();
        assert_eq!(gateway.fetch("media", key).await.unwrap().content_type, "image/png");
    }

    #[tokio::test]
    async fn test_same_name_does_not_collide() {
        let gateway = gateway();
        let a = gateway.upload(Bytes::from_static(b"1"), Some("a.png")).await.unwrap();
        let b = gateway.upload(Bytes::from_static(b"2"), Some("a.png")).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(gateway.store().object_count("media"), 2);
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let err = gateway().upload(Bytes::new(), None).await.unwrap_err();
        assert!(matches!(err, StorageError::EmptyContent));
    }

    #[tokio::test]
    async fn test_fetch_only_reads_media_bucket() {
        let gateway = gateway();
        let store = gateway.store();
        store.create_bucket("private-backups").await.unwrap();
        store
            .put_object(
                "private-backups",
                "secrets.txt",
                Bytes::from_static(b"hunter2"),
                "text/plain",
            )
            .await
            .unwrap();

        let err = gateway.fetch("private-backups", "secrets.txt").await.unwrap_err();
        assert!(matches!(err, StorageError::BucketNotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_url() {
        let gateway = gateway();
        let url = gateway.upload(Bytes::from_static(b"x"), None).await.unwrap();

        assert!(gateway.remove_url(&url).await.unwrap());
        assert_eq!(gateway.store().object_count("media"), 0);

        assert!(!gateway.remove_url("https://elsewhere.example/a.png").await.unwrap());
    }

    #[rstest]
    #[case("photo.png", "photo.png")]
    #[case("../../etc/passwd", "passwd")]
    #[case("C:\\Users\\me\\pic.jpg", "pic.jpg")]
    #[case("weird name!.gif", "weird-name-.gif")]
    #[case("..", "")]
    fn test_sanitize_filename(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_filename(input), expected);
    }

    #[test]
    fn test_object_key_for_blank_name() {
        let key = object_key(Some(".."));
        assert!(key.ends_with(".jpg"));
    }
}
