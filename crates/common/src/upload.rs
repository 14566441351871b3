//! Chunked upload pipeline.
//!
//! Inbound bytes are buffered up to the part size. A payload that fits is
//! kept in memory and written with a single put once the caller commits. A
//! larger one switches to a multi-part upload: the first part goes out as soon
//! as the buffer passes the part size, later parts follow as bytes arrive, and
//! the inbound stream is not polled while too many parts are in flight.
//!
//! Either way the SHA-256 fingerprint is computed over the whole byte
//! sequence, so the same bytes always get the same fingerprint.

use blob_store::{BlobStore, BlobStoreError, BlobUpload};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use sha2::{Digest, Sha256};

/// Smallest part size S3 accepts for all but the last part.
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy)]
pub struct UploadConfig {
    /// Part size, and the threshold above which uploads go multi-part
    pub part_size: usize,
    /// Parts allowed in flight before the inbound stream is paused
    pub max_in_flight: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            part_size: MIN_PART_SIZE,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

/// Error raised by an inbound byte stream.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The inbound byte stream failed
    #[error("upload stream failed: {0}")]
    Source(SourceError),
    #[error(transparent)]
    Storage(#[from] BlobStoreError),
}

/// Incremental content fingerprint.
#[derive(Debug, Clone, Default)]
pub struct Fingerprinter(Sha256);

impl Fingerprinter {
    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    /// Lowercase hex SHA-256.
    pub fn finish(self) -> String {
        hex::encode(self.0.finalize())
    }
}

/// Fingerprint of a complete byte sequence.
pub fn fingerprint(data: &[u8]) -> String {
    let mut fingerprinter = Fingerprinter::default();
    fingerprinter.update(data);
    fingerprinter.finish()
}

/// Declared content type, else a guess from the name, else binary.
pub fn resolve_content_type(declared: Option<&str>, name: &str) -> String {
    match declared.map(str::trim).filter(|s| !s.is_empty()) {
        Some(declared) => declared.to_string(),
        None => mime_guess::from_path(name)
            .first_raw()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string(),
    }
}

enum StagedBody {
    Single(Bytes),
    Multipart(BlobUpload),
}

/// Content fully received from the caller but not yet visible anywhere.
pub struct StagedContent {
    body: StagedBody,
    content_length: u64,
    fingerprint: String,
}

impl StagedContent {
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self.body, StagedBody::Multipart(_))
    }

    /// Write out the content blob, returning its id.
    pub async fn persist(self, blobs: &BlobStore) -> Result<String, BlobStoreError> {
        match self.body {
            StagedBody::Single(data) => blobs.put_blob(data).await,
            StagedBody::Multipart(upload) => {
                let blob_id = upload.blob_id().to_string();
                upload.finish().await?;
                Ok(blob_id)
            }
        }
    }

    /// Throw the content away, aborting any multi-part upload.
    pub async fn discard(self) {
        if let StagedBody::Multipart(upload) = self.body {
            let blob_id = upload.blob_id().to_string();
            if let Err(e) = upload.abort().await {
                tracing::warn!(blob_id = %blob_id, "failed to abort upload: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for StagedContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedContent")
            .field("content_length", &self.content_length)
            .field("fingerprint", &self.fingerprint)
            .field("multipart", &self.is_multipart())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct UploadPipeline {
    blobs: BlobStore,
    config: UploadConfig,
}

impl UploadPipeline {
    pub fn new(blobs: BlobStore, config: UploadConfig) -> Self {
        Self { blobs, config }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Drain `content`, staging it for a later commit.
    ///
    /// If the stream fails, or this future is dropped part way, any
    /// multi-part upload already started is aborted.
    pub async fn stage<S, E>(&self, content: S) -> Result<StagedContent, UploadError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<SourceError>,
    {
        let mut content = std::pin::pin!(content);
        let mut fingerprinter = Fingerprinter::default();
        let mut buffer = BytesMut::new();
        let mut content_length: u64 = 0;
        let mut upload: Option<BlobUpload> = None;

        while let Some(chunk) = content.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    if let Some(upload) = upload.take() {
                        abort(upload).await;
                    }
                    return Err(UploadError::Source(e.into()));
                }
            };
            fingerprinter.update(&chunk);
            content_length += chunk.len() as u64;

            match upload.as_mut() {
                Some(active) => {
                    if let Err(e) = active.write(&chunk, self.config.max_in_flight).await {
                        if let Some(upload) = upload.take() {
                            abort(upload).await;
                        }
                        return Err(e.into());
                    }
                }
                None => {
                    buffer.extend_from_slice(&chunk);
                    if buffer.len() > self.config.part_size {
                        let mut started = self.blobs.start_upload(self.config.part_size).await?;
                        let buffered = buffer.split().freeze();
                        if let Err(e) = started.write(&buffered, self.config.max_in_flight).await {
                            abort(started).await;
                            return Err(e.into());
                        }
                        upload = Some(started);
                    }
                }
            }
        }

        let body = match upload {
            Some(upload) => StagedBody::Multipart(upload),
            None => StagedBody::Single(buffer.freeze()),
        };
        let staged = StagedContent {
            body,
            content_length,
            fingerprint: fingerprinter.finish(),
        };
        tracing::debug!(
            content_length,
            multipart = staged.is_multipart(),
            "staged upload"
        );
        Ok(staged)
    }
}

async fn abort(upload: BlobUpload) {
    let blob_id = upload.blob_id().to_string();
    tracing::warn!(blob_id = %blob_id, "aborting multi-part upload");
    if let Err(e) = upload.abort().await {
        tracing::warn!(blob_id = %blob_id, "failed to abort upload: {}", e);
    }
}
