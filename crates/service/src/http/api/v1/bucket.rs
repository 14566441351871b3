use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;

use crate::http::auth::Caller;

/// The caller's own bucket, plus its app-data path when acting for a
/// deployment.
#[tracing::instrument(skip(identity))]
pub async fn handler(Caller(identity): Caller) -> Response {
    (StatusCode::OK, Json(identity.bucket().clone())).into_response()
}
