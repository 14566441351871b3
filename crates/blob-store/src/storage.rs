//! Object storage backend abstraction (S3/MinIO/local filesystem/memory).

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{MultipartUpload, ObjectStore};
use serde::{Deserialize, Serialize};

use crate::error::{BlobStoreError, Result};

const DATA_PREFIX: &str = "data";
const INDEX_PREFIX: &str = "index";

/// Configuration for the object storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlobStoreConfig {
    /// In-memory storage (for testing)
    #[default]
    Memory,

    /// Local filesystem storage
    Local {
        /// Path to the storage directory
        path: PathBuf,
    },

    /// S3-compatible storage (AWS S3, MinIO, etc.)
    S3 {
        /// S3 endpoint URL (e.g., "http://localhost:9000" for MinIO)
        endpoint: String,
        /// Access key ID
        access_key: String,
        /// Secret access key
        secret_key: String,
        /// Bucket name
        bucket: String,
        /// Optional region (defaults to "us-east-1")
        region: Option<String>,
    },
}

/// Wrapper around different object storage backends.
///
/// Knows the two key spaces (`data/` and `index/`) but nothing about what
/// goes into them.
#[derive(Debug, Clone)]
pub(crate) struct Storage {
    inner: Arc<dyn ObjectStore>,
}

impl Storage {
    /// Create a new storage backend from configuration.
    pub async fn new(config: BlobStoreConfig) -> Result<Self> {
        let inner: Arc<dyn ObjectStore> = match &config {
            BlobStoreConfig::Memory => Arc::new(InMemory::new()),

            BlobStoreConfig::Local { path } => {
                tokio::fs::create_dir_all(path).await?;
                // empty directories left by a delete would still list as folders
                Arc::new(
                    LocalFileSystem::new_with_prefix(path)
                        .map_err(|e| BlobStoreError::InvalidConfig(e.to_string()))?
                        .with_automatic_cleanup(true),
                )
            }

            BlobStoreConfig::S3 {
                endpoint,
                access_key,
                secret_key,
                bucket,
                region,
            } => {
                let builder = AmazonS3Builder::new()
                    .with_endpoint(endpoint)
                    .with_access_key_id(access_key)
                    .with_secret_access_key(secret_key)
                    .with_bucket_name(bucket)
                    .with_region(region.as_deref().unwrap_or("us-east-1"))
                    .with_allow_http(endpoint.starts_with("http://"));

                let store: Arc<dyn ObjectStore> = Arc::new(
                    builder
                        .build()
                        .map_err(|e| BlobStoreError::InvalidConfig(e.to_string()))?,
                );

                ensure_bucket(store.as_ref(), bucket).await?;

                store
            }
        };

        Ok(Self { inner })
    }

    /// Create an in-memory storage backend.
    pub fn memory() -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
        }
    }

    fn data_path(blob_id: &str) -> ObjectPath {
        ObjectPath::from_iter([DATA_PREFIX, blob_id])
    }

    /// Build the index path for a `/`-separated, decoded resource key.
    ///
    /// Each segment becomes one path part; the object store escapes
    /// characters it can't hold, and [`decode_part`] reverses that.
    fn index_path(key: &str) -> ObjectPath {
        ObjectPath::from_iter(
            std::iter::once(INDEX_PREFIX).chain(key.split('/').filter(|s| !s.is_empty())),
        )
    }

    pub async fn put_data(&self, blob_id: &str, data: Bytes) -> Result<()> {
        let path = Self::data_path(blob_id);
        self.inner.put(&path, data.into()).await?;
        Ok(())
    }

    pub async fn start_data_upload(&self, blob_id: &str) -> Result<Box<dyn MultipartUpload>> {
        let path = Self::data_path(blob_id);
        Ok(self.inner.put_multipart(&path).await?)
    }

    /// Stream blob data; `None` if the blob doesn't exist.
    pub async fn get_data(
        &self,
        blob_id: &str,
    ) -> Result<Option<BoxStream<'static, object_store::Result<Bytes>>>> {
        let path = Self::data_path(blob_id);
        match self.inner.get(&path).await {
            Ok(result) => Ok(Some(result.into_stream())),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_data(&self, blob_id: &str) -> Result<()> {
        let path = Self::data_path(blob_id);
        // the blob may already be gone
        match self.inner.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn put_index(&self, key: &str, data: Bytes) -> Result<()> {
        let path = Self::index_path(key);
        self.inner.put(&path, data.into()).await?;
        Ok(())
    }

    pub async fn get_index(&self, key: &str) -> Result<Option<Bytes>> {
        let path = Self::index_path(key);
        match self.inner.get(&path).await {
            Ok(result) => Ok(Some(result.bytes().await?)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_index(&self, key: &str) -> Result<()> {
        let path = Self::index_path(key);
        match self.inner.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// List the direct children of an index folder.
    ///
    /// Returns `(items, folders)` as decoded segment names.
    pub async fn list_index(&self, prefix: &str) -> Result<(Vec<String>, Vec<String>)> {
        let path = Self::index_path(prefix);
        let listing = self.inner.list_with_delimiter(Some(&path)).await?;

        let items = listing
            .objects
            .iter()
            .filter_map(|meta| meta.location.filename().map(decode_part))
            .collect();
        let folders = listing
            .common_prefixes
            .iter()
            .filter_map(|p| p.filename().map(decode_part))
            .collect();

        Ok((items, folders))
    }

    /// Whether any index record lies below `prefix`.
    pub async fn has_index_children(&self, prefix: &str) -> Result<bool> {
        let path = Self::index_path(prefix);
        let mut stream = self.inner.list(Some(&path));
        while let Some(meta) = stream.try_next().await? {
            if meta.location != path {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// List every item under an index folder, at any depth.
    ///
    /// Returns decoded paths relative to `prefix`, `/`-separated.
    pub async fn list_index_recursive(&self, prefix: &str) -> Result<Vec<String>> {
        let path = Self::index_path(prefix);
        let metas: Vec<_> = self.inner.list(Some(&path)).try_collect().await?;

        let mut items: Vec<String> = metas
            .iter()
            .filter_map(|meta| {
                meta.location.prefix_match(&path).map(|parts| {
                    parts
                        .map(|part| decode_part(part.as_ref()))
                        .collect::<Vec<_>>()
                        .join("/")
                })
            })
            .filter(|relative| !relative.is_empty())
            .collect();
        items.sort();

        Ok(items)
    }

    /// Ids of every content blob.
    pub async fn list_data(&self) -> Result<Vec<String>> {
        let prefix = ObjectPath::from(DATA_PREFIX);
        let metas: Vec<_> = self.inner.list(Some(&prefix)).try_collect().await?;
        Ok(metas
            .iter()
            .filter_map(|meta| meta.location.filename().map(str::to_string))
            .collect())
    }
}

/// Fail fast when the configured S3 bucket doesn't exist.
async fn ensure_bucket(store: &dyn ObjectStore, bucket: &str) -> Result<()> {
    let prefix = ObjectPath::from(INDEX_PREFIX);
    let mut stream = store.list(Some(&prefix));
    match stream.try_next().await {
        Ok(_) => Ok(()),
        Err(object_store::Error::NotFound { .. }) => {
            Err(BlobStoreError::BucketNotFound(bucket.to_string()))
        }
        Err(e) if e.to_string().contains("NoSuchBucket") => {
            Err(BlobStoreError::BucketNotFound(bucket.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Undo the object store's percent escaping of a single path part.
fn decode_part(part: &str) -> String {
    urlencoding::decode(part)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| part.to_string())
}
