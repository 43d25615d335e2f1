//! # Mosaic Storage
//!
//! Object storage layer for uploaded media.
//!
//! This crate provides:
//! - **ObjectStore trait**: bucket and object operations shared by every backend
//! - **Backends**: in-memory, local filesystem, and S3-compatible (MinIO) over HTTP
//! - **MediaGateway**: idempotent bucket setup, key generation, content-type
//!   detection and public URL construction
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             Request Handlers            │
//! ├─────────────────────────────────────────┤
//! │              MediaGateway               │
//! ├─────────────────────────────────────────┤
//! │            ObjectStore Trait            │
//! ├─────────────┬─────────────┬─────────────┤
//! │ MemoryStore │   FsStore   │   S3Store   │
//! └─────────────┴─────────────┴─────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use mosaic_storage::{MediaGateway, MemoryObjectStore};
//!
//! let gateway = MediaGateway::new(store, "media", "http://localhost:8000/objects");
//! let url = gateway.upload(bytes, Some("sunset.png")).await?;
//! ```

pub mod error;
pub mod flexible;
pub mod fs;
pub mod gateway;
pub mod memory;
pub mod s3;
pub mod sigv4;

pub use error::{Result, StorageError};
pub use flexible::FlexibleObjectStore;
pub use fs::FsObjectStore;
pub use gateway::{MediaGateway, DEFAULT_BUCKET, DEFAULT_EXTENSION};
pub use memory::MemoryObjectStore;
pub use s3::{S3Config, S3ObjectStore};

use async_trait::async_trait;
use bytes::Bytes;

/// Fallback content type when the extension is unknown
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// An object read back from a store
#[derive(Clone, Debug)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

/// Trait for object storage backends
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Check whether a bucket exists
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Create a bucket, failing with `BucketAlreadyExists` if it is already there
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Allow anonymous reads of every object in the bucket
    async fn set_public_read(&self, bucket: &str) -> Result<()>;

    /// Store an object, replacing any previous value under the key
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<()>;

    /// Retrieve an object
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject>;

    /// Delete an object; deleting a missing object is not an error
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;
}

/// Validate bucket name according to S3 rules
pub fn validate_bucket_name(name: &str) -> Result<()> {
    if name.len() < 3 || name.len() > 63 {
        return Err(StorageError::InvalidBucketName(
            "Bucket name must be between 3 and 63 characters".to_string(),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(StorageError::InvalidBucketName(
            "Bucket name can only contain lowercase letters, numbers, hyphens, and periods"
                .to_string(),
        ));
    }

    if name.starts_with('-') || name.ends_with('-') {
        return Err(StorageError::InvalidBucketName(
            "Bucket name cannot start or end with a hyphen".to_string(),
        ));
    }

    Ok(())
}

/// Validate object key
pub fn validate_object_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidObjectKey("Key cannot be empty".to_string()));
    }

    if key.len() > 1024 {
        return Err(StorageError::InvalidObjectKey(
            "Key cannot exceed 1024 characters".to_string(),
        ));
    }

    if key.starts_with('/') || key.split('/').any(|segment| segment == ".." || segment == ".") {
        return Err(StorageError::InvalidObjectKey(
            "Key cannot contain relative path segments".to_string(),
        ));
    }

    Ok(())
}

/// Guess a content type from the key's extension
pub fn content_type_for(key: &str) -> String {
    mime_guess::from_path(key)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_bucket_name_validation() {
        assert!(validate_bucket_name("media").is_ok());
        assert!(validate_bucket_name("my.bucket-1").is_ok());

        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name("-media").is_err());
        assert!(validate_bucket_name("Media").is_err());
    }

    #[rstest]
    #[case("photo.jpg", true)]
    #[case("nested/photo.jpg", true)]
    #[case("", false)]
    #[case("/etc/passwd", false)]
    #[case("../escape.png", false)]
    #[case("a/./b", false)]
    fn test_object_key_validation(#[case] key: &str, #[case] valid: bool) {
        assert_eq!(validate_object_key(key).is_ok(), valid);
    }

    #[rstest]
    #[case("sunset.jpg", "image/jpeg")]
    #[case("diagram.png", "image/png")]
    #[case("clip.mp4", "video/mp4")]
    #[case("archive.unknownext", DEFAULT_CONTENT_TYPE)]
    #[case("no-extension", DEFAULT_CONTENT_TYPE)]
    fn test_content_type_for(#[case] key: &str, #[case] expected: &str) {
        assert_eq!(content_type_for(key), expected);
    }
}
