//! Errors surfaced at the resource service boundary.

use blob_store::BlobStoreError;
use http::StatusCode;

use crate::access::AccessError;
use crate::precondition::PreconditionError;
use crate::publication::DocumentError;
use crate::resource::DescriptorError;
use crate::upload::UploadError;

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// Malformed path, missing file name, invalid bucket or document
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    AccessDenied(#[from] AccessError),
    #[error("Not found: {0}")]
    NotFound(String),
    /// An item and a folder would share one name
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    PreconditionFailed(#[from] PreconditionError),
    #[error("storage error: {0}")]
    Storage(#[from] BlobStoreError),
}

impl ResourceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ResourceError::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ResourceError::Validation(_) => StatusCode::BAD_REQUEST,
            ResourceError::AccessDenied(_) => StatusCode::FORBIDDEN,
            ResourceError::NotFound(_) => StatusCode::NOT_FOUND,
            ResourceError::Conflict(_) => StatusCode::CONFLICT,
            ResourceError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            ResourceError::Storage(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            ResourceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ResourceError::Storage(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<DescriptorError> for ResourceError {
    fn from(e: DescriptorError) -> Self {
        ResourceError::Validation(e.to_string())
    }
}

impl From<DocumentError> for ResourceError {
    fn from(e: DocumentError) -> Self {
        ResourceError::Validation(e.to_string())
    }
}

impl From<UploadError> for ResourceError {
    fn from(e: UploadError) -> Self {
        match e {
            // a publication copy streams out of the blob store itself
            UploadError::Source(source) => match source.downcast::<BlobStoreError>() {
                Ok(e) => ResourceError::Storage(*e),
                Err(source) => ResourceError::Validation(source.to_string()),
            },
            UploadError::Storage(e) => ResourceError::Storage(e),
        }
    }
}
