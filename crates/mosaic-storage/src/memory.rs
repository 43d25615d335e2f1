//! In-memory object store for testing and development

use crate::{ObjectStore, Result, StorageError, StoredObject};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MemoryBucket {
    public: bool,
    objects: DashMap<String, StoredObject>,
}

/// An in-memory object store
#[derive(Clone, Debug, Default)]
pub struct MemoryObjectStore {
    buckets: Arc<DashMap<String, MemoryBucket>>,
}

impl MemoryObjectStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
        }
    }

    /// Number of objects stored in a bucket
    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets
            .get(bucket)
            .map(|b| b.objects.len())
            .unwrap_or(0)
    }

    /// Whether a bucket has been made publicly readable
    pub fn is_public(&self, bucket: &str) -> bool {
        self.buckets.get(bucket).map(|b| b.public).unwrap_or(false)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(self.buckets.contains_key(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        match self.buckets.entry(bucket.to_string()) {
            Entry::Occupied(_) => Err(StorageError::BucketAlreadyExists(bucket.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(MemoryBucket::default());
                Ok(())
            }
        }
    }

    async fn set_public_read(&self, bucket: &str) -> Result<()> {
        let mut entry = self
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        entry.public = true;
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<()> {
        let entry = self
            .buckets
            .get(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        entry.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject> {
        let entry = self
            .buckets
            .get(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        let object = entry
            .objects
            .get(key)
            .map(|o| o.value().clone())
            .ok_or_else(|| StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        Ok(object)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        if let Some(entry) = self.buckets.get(bucket) {
            entry.objects.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryObjectStore::new();
        store.create_bucket("media").await.unwrap();

        store
            .put_object("media", "a.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();

        let object = store.get_object("media", "a.png").await.unwrap();
        assert_eq!(object.data.as_ref(), b"png");
        assert_eq!(object.content_type, "image/png");
        assert_eq!(store.object_count("media"), 1);
    }

    #[tokio::test]
    async fn test_create_bucket_twice() {
        let store = MemoryObjectStore::new();
        store.create_bucket("media").await.unwrap();

        let result = store.create_bucket("media").await;
        assert!(matches!(result, Err(StorageError::BucketAlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_missing_bucket_and_object() {
        let store = MemoryObjectStore::new();
        let result = store
            .put_object("nope", "k", Bytes::new(), "text/plain")
            .await;
        assert!(matches!(result, Err(StorageError::BucketNotFound(_))));

        store.create_bucket("media").await.unwrap();
        let result = store.get_object("media", "missing").await;
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryObjectStore::new();
        store.create_bucket("media").await.unwrap();
        store
            .put_object("media", "k", Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap();

        store.delete_object("media", "k").await.unwrap();
        store.delete_object("media", "k").await.unwrap();
        assert_eq!(store.object_count("media"), 0);
    }
}
