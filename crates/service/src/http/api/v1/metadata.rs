use axum::extract::{OriginalUri, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::prelude::{MetadataOptions, METADATA_MEDIA_TYPE};
use http::header::{ACCEPT, CONTENT_TYPE};
use http::StatusCode;
use serde::Deserialize;

use super::resource_from_uri;
use crate::http::auth::Caller;
use crate::http::error::ApiError;
use crate::ServiceState;

const METADATA_PREFIX: &str = "metadata/";
const JSON_MEDIA_TYPE: &str = "application/json";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MetadataQuery {
    pub permissions: bool,
    pub recursive: bool,
}

#[tracing::instrument(skip(state, caller, headers))]
pub async fn handler(
    State(state): State<ServiceState>,
    Caller(caller): Caller,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<MetadataQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let descriptor = resource_from_uri(&uri, METADATA_PREFIX)?;
    let options = MetadataOptions {
        permissions: query.permissions,
        recursive: query.recursive,
    };
    let metadata = state
        .resources()
        .metadata(&caller, &descriptor, options)
        .await?;

    Ok((
        StatusCode::OK,
        [(CONTENT_TYPE, negotiate(&headers))],
        Json(metadata),
    )
        .into_response())
}

/// The dedicated metadata media type when the client names it, plain JSON
/// otherwise.
fn negotiate(headers: &HeaderMap) -> &'static str {
    let wants_metadata = headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|media| media.split(';').next().map(str::trim) == Some(METADATA_MEDIA_TYPE));
    if wants_metadata {
        METADATA_MEDIA_TYPE
    } else {
        JSON_MEDIA_TYPE
    }
}
