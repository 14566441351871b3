//! Error types for the blob store.

/// Errors that can occur when working with the blob store.
#[derive(Debug, thiserror::Error)]
pub enum BlobStoreError {
    /// Object storage error
    #[error("object storage error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An index record could not be decoded
    #[error("corrupt index record at {key}: {source}")]
    CorruptRecord {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Content blob referenced by an index record is missing
    #[error("blob not found: {0}")]
    NotFound(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// S3 bucket not found - must be created before use
    #[error("S3 bucket '{0}' does not exist. Create it before starting the gateway.")]
    BucketNotFound(String),
}

impl BlobStoreError {
    /// Whether retrying the same operation may succeed.
    ///
    /// Transport level failures and IO errors are transient; missing objects,
    /// bad configuration and corrupt records are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            BlobStoreError::ObjectStore(e) => matches!(
                e,
                object_store::Error::Generic { .. } | object_store::Error::JoinError { .. }
            ),
            BlobStoreError::Io(_) => true,
            BlobStoreError::CorruptRecord { .. }
            | BlobStoreError::NotFound(_)
            | BlobStoreError::InvalidConfig(_)
            | BlobStoreError::BucketNotFound(_) => false,
        }
    }
}

/// Result type alias for blob store operations.
pub type Result<T> = std::result::Result<T, BlobStoreError>;
