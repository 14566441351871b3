//! BlobStore - resource content plus the index records that make it visible.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use object_store::WriteMultipart;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{BlobStoreError, Result};
use crate::storage::{BlobStoreConfig, Storage};
use crate::upload::BlobUpload;

/// A stream of blob content.
pub type BlobStream = BoxStream<'static, Result<Bytes>>;

/// Index record stored at a resource path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobRecord {
    /// Content blob this record points at
    pub blob_id: String,
    pub content_type: String,
    pub content_length: u64,
    /// Content fingerprint, computed by the writer over the full byte sequence
    pub fingerprint: String,
    pub updated_at: DateTime<Utc>,
}

impl BlobRecord {
    pub fn new(
        blob_id: impl Into<String>,
        content_type: impl Into<String>,
        content_length: u64,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            blob_id: blob_id.into(),
            content_type: content_type.into(),
            content_length,
            fingerprint: fingerprint.into(),
            updated_at: Utc::now(),
        }
    }
}

/// Direct children of a folder, as decoded segment names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobListing {
    pub items: Vec<String>,
    pub folders: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    storage: Storage,
}

impl BlobStore {
    pub async fn new(config: BlobStoreConfig) -> Result<Self> {
        let storage = Storage::new(config).await?;
        Ok(Self { storage })
    }

    /// A fully ephemeral store.
    pub fn memory() -> Self {
        Self {
            storage: Storage::memory(),
        }
    }

    fn new_blob_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Write a content blob in one request, returning its id.
    pub async fn put_blob(&self, data: Bytes) -> Result<String> {
        let blob_id = Self::new_blob_id();
        self.storage.put_data(&blob_id, data).await?;
        Ok(blob_id)
    }

    /// Start a multi-part content blob cut into `part_size` byte parts.
    pub async fn start_upload(&self, part_size: usize) -> Result<BlobUpload> {
        let blob_id = Self::new_blob_id();
        let upload = self.storage.start_data_upload(&blob_id).await?;
        let writer = WriteMultipart::new_with_chunk_size(upload, part_size);
        debug!(blob_id = %blob_id, part_size, "started multi-part upload");
        Ok(BlobUpload::new(blob_id, writer))
    }

    /// Delete a content blob that never got (or no longer has) a record.
    pub async fn discard_blob(&self, blob_id: &str) -> Result<()> {
        self.storage.delete_data(blob_id).await
    }

    /// Read the index record at `key`.
    pub async fn record(&self, key: &str) -> Result<Option<BlobRecord>> {
        match self.storage.get_index(key).await? {
            Some(raw) => {
                let record = serde_json::from_slice(&raw).map_err(|source| {
                    BlobStoreError::CorruptRecord {
                        key: key.to_string(),
                        source,
                    }
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Make `record` visible at `key`, replacing whatever was there.
    ///
    /// Returns the replaced record. Its blob is deleted once the new record
    /// has landed. Callers serialize commits and removes on one key; two
    /// interleaved commits would both release the same previous blob.
    pub async fn commit(&self, key: &str, record: &BlobRecord) -> Result<Option<BlobRecord>> {
        let previous = self.record(key).await?;
        let raw = serde_json::to_vec(record).map_err(|source| BlobStoreError::CorruptRecord {
            key: key.to_string(),
            source,
        })?;
        self.storage.put_index(key, Bytes::from(raw)).await?;

        if let Some(previous) = &previous {
            if previous.blob_id != record.blob_id {
                self.release(&previous.blob_id).await;
            }
        }
        Ok(previous)
    }

    /// Remove the record at `key` and its blob.
    pub async fn remove(&self, key: &str) -> Result<Option<BlobRecord>> {
        let Some(record) = self.record(key).await? else {
            return Ok(None);
        };
        self.storage.delete_index(key).await?;
        self.release(&record.blob_id).await;
        Ok(Some(record))
    }

    async fn release(&self, blob_id: &str) {
        if let Err(e) = self.storage.delete_data(blob_id).await {
            warn!(blob_id = %blob_id, "failed to delete replaced blob: {}", e);
        }
    }

    /// Stream the content `record` points at.
    pub async fn open(&self, record: &BlobRecord) -> Result<BlobStream> {
        match self.storage.get_data(&record.blob_id).await? {
            Some(stream) => Ok(stream.map_err(BlobStoreError::from).boxed()),
            None => Err(BlobStoreError::NotFound(record.blob_id.clone())),
        }
    }

    /// Read the record at `key` together with its content.
    ///
    /// A concurrent replace may delete the blob between reading the record and
    /// opening it, so a missing blob re-reads the record once.
    pub async fn get(&self, key: &str) -> Result<Option<(BlobRecord, BlobStream)>> {
        for _ in 0..2 {
            let Some(record) = self.record(key).await? else {
                return Ok(None);
            };
            match self.open(&record).await {
                Ok(stream) => return Ok(Some((record, stream))),
                Err(BlobStoreError::NotFound(blob_id)) => {
                    debug!(key, blob_id = %blob_id, "blob replaced while opening, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// List the direct children of the folder at `prefix`.
    pub async fn list(&self, prefix: &str) -> Result<BlobListing> {
        let (mut items, mut folders) = self.storage.list_index(prefix).await?;
        items.sort();
        folders.sort();
        Ok(BlobListing { items, folders })
    }

    /// Whether anything is indexed below the folder at `prefix`.
    pub async fn has_children(&self, prefix: &str) -> Result<bool> {
        self.storage.has_index_children(prefix).await
    }

    /// Ids of every stored content blob, referenced or not.
    pub async fn list_blobs(&self) -> Result<Vec<String>> {
        let mut blob_ids = self.storage.list_data().await?;
        blob_ids.sort();
        Ok(blob_ids)
    }

    /// List every item below `prefix`, as `/`-separated relative paths.
    pub async fn list_recursive(&self, prefix: &str) -> Result<Vec<String>> {
        self.storage.list_index_recursive(prefix).await
    }
}
