use axum::async_trait;
use axum::extract::FromRequestParts;
use common::prelude::{AuthError, Identity};
use http::request::Parts;

use super::error::ApiError;
use crate::ServiceState;

pub const API_KEY_HEADER: &str = "api-key";

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct Caller(pub Identity);

#[async_trait]
impl FromRequestParts<ServiceState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServiceState,
    ) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .ok_or(AuthError::MissingKey)?;

        let identity = state.auth().authenticate(key).map_err(|e| {
            tracing::debug!("rejected api key: {}", e);
            e
        })?;
        Ok(Caller(identity))
    }
}
