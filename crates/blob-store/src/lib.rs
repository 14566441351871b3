//! Blob storage backend for stash.
//!
//! Resource content lives in an object store (S3/MinIO, local filesystem, or memory).
//! Every stored resource is made of two objects:
//!
//! - a content blob under `data/<blob id>`, written either in one shot or as a
//!   multi-part upload
//! - an index record under `index/<resource path>`, a small JSON document that
//!   points at the blob and carries its fingerprint, content type and length
//!
//! Writing the index record is the commit point. Until it lands nothing is
//! visible at the resource path, so an aborted or failed upload never leaves a
//! partial resource behind. Listing walks the `index/` tree, which mirrors the
//! resource path hierarchy segment by segment.
//!
//! # Example
//!
//! ```rust,no_run
//! use blob_store::{BlobStore, BlobRecord};
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), blob_store::BlobStoreError> {
//! let store = BlobStore::memory();
//!
//! let data = Bytes::from("hello");
//! let blob_id = store.put_blob(data.clone()).await?;
//! let record = BlobRecord::new(blob_id, "text/plain", data.len() as u64, "fingerprint");
//! store.commit("files/bucket/hello.txt", &record).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod storage;
mod store;
mod upload;

pub use error::{BlobStoreError, Result};
pub use storage::BlobStoreConfig;
pub use store::{BlobListing, BlobRecord, BlobStore, BlobStream};
pub use upload::BlobUpload;
