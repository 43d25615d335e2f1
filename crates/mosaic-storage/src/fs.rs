//! Local filesystem object store
//!
//! Each bucket is a directory under the root. Objects are written next to a
//! `.content-type` sidecar so reads can return the type recorded at upload time.
//! A `.public` marker file records the anonymous-read policy.

use crate::{
    content_type_for, validate_bucket_name, validate_object_key, ObjectStore, Result,
    StorageError, StoredObject,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

const CONTENT_TYPE_SUFFIX: &str = ".content-type";
const PUBLIC_MARKER: &str = ".public";

/// Object store backed by a directory tree
#[derive(Clone, Debug)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open (and create if needed) a store rooted at `root`
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf> {
        validate_bucket_name(bucket)?;
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        validate_object_key(key)?;
        if key.ends_with(CONTENT_TYPE_SUFFIX) || key == PUBLIC_MARKER {
            return Err(StorageError::InvalidObjectKey(format!(
                "reserved key name: {}",
                key
            )));
        }
        Ok(self.bucket_path(bucket)?.join(key))
    }

    async fn require_bucket(&self, bucket: &str) -> Result<PathBuf> {
        let path = self.bucket_path(bucket)?;
        if !fs::try_exists(&path).await? {
            return Err(StorageError::BucketNotFound(bucket.to_string()));
        }
        Ok(path)
    }
}

fn sidecar(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(CONTENT_TYPE_SUFFIX);
    PathBuf::from(name)
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let path = self.bucket_path(bucket)?;
        Ok(fs::try_exists(path).await?)
    }

    #[instrument(skip(self))]
    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let path = self.bucket_path(bucket)?;
        match fs::create_dir(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Created bucket directory");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StorageError::BucketAlreadyExists(bucket.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set_public_read(&self, bucket: &str) -> Result<()> {
        let path = self.require_bucket(bucket).await?;
        fs::write(path.join(PUBLIC_MARKER), b"s3:GetObject").await?;
        Ok(())
    }

    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<()> {
        self.require_bucket(bucket).await?;
        let path = self.object_path(bucket, key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&path, &data).await?;
        fs::write(sidecar(&path), content_type.as_bytes()).await?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject> {
        self.require_bucket(bucket).await?;
        let path = self.object_path(bucket, key)?;

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let content_type = match fs::read_to_string(sidecar(&path)).await {
            Ok(value) => value,
            Err(_) => content_type_for(key),
        };

        Ok(StoredObject {
            data: Bytes::from(data),
            content_type,
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        for target in [sidecar(&path), path] {
            match fs::remove_file(&target).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
