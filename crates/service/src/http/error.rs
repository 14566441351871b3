use axum::response::{IntoResponse, Response};
use common::prelude::{AccessError, AuthError, ResourceError};
use http::StatusCode;

/// Anything a handler can fail with. Every variant renders as a plain-text
/// body carrying the message, with the matching status.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Unauthorized(#[from] AuthError),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Resource(e) => e.status_code(),
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(e: AccessError) -> Self {
        ApiError::Resource(e.into())
    }
}

impl From<common::resource::DescriptorError> for ApiError {
    fn from(e: common::resource::DescriptorError) -> Self {
        ApiError::Resource(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ApiError::Resource(ResourceError::Storage(e)) => {
                tracing::error!("storage failure: {}", e);
                "Unexpected error".to_string()
            }
            _ => self.to_string(),
        };
        (status, [(http::header::CONTENT_TYPE, "text/plain")], body).into_response()
    }
}
