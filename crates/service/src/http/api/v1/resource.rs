use axum::body::Body;
use axum::extract::{FromRequest, Multipart, OriginalUri, Request, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use common::prelude::{ItemMetadata, ResourceDescriptor};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use http::StatusCode;

use super::{preconditions, resource_from_uri};
use crate::http::auth::Caller;
use crate::http::error::ApiError;
use crate::ServiceState;

/// Multipart field carrying file content.
pub const ATTACHMENT_FIELD: &str = "attachment";

#[tracing::instrument(skip(state, caller))]
pub async fn get_handler(
    State(state): State<ServiceState>,
    Caller(caller): Caller,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ApiError> {
    let descriptor = resource_from_uri(&uri, "")?;
    let download = state.resources().download(&caller, &descriptor).await?;

    let metadata = download.metadata;
    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, metadata.content_type),
            (CONTENT_LENGTH, metadata.content_length.to_string()),
            (ETAG, metadata.etag),
        ],
        Body::from_stream(download.content),
    )
        .into_response())
}

/// Files take a multipart form with an `attachment` field and are streamed
/// through. Structured resources take the JSON document as the raw body.
#[tracing::instrument(skip(state, caller, headers, request))]
pub async fn put_handler(
    State(state): State<ServiceState>,
    Caller(caller): Caller,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    request: Request,
) -> Result<Response, ApiError> {
    let descriptor = resource_from_uri(&uri, "")?;
    let preconditions = preconditions(&headers)?;

    let item = if descriptor.resource_type().is_structured() {
        let body = Bytes::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        state
            .resources()
            .put_document(&caller, &descriptor, body, &preconditions)
            .await?
    } else {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        upload_attachment(&state, &caller, &descriptor, multipart, &preconditions).await?
    };

    Ok(item_response(item))
}

async fn upload_attachment(
    state: &ServiceState,
    caller: &common::prelude::Identity,
    descriptor: &ResourceDescriptor,
    mut multipart: Multipart,
    preconditions: &common::prelude::Preconditions,
) -> Result<ItemMetadata, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() != Some(ATTACHMENT_FIELD) {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let item = state
            .resources()
            .upload(caller, descriptor, field, content_type.as_deref(), preconditions)
            .await?;
        return Ok(item);
    }
    Err(ApiError::bad_request(format!(
        "Multipart field '{}' is missing",
        ATTACHMENT_FIELD
    )))
}

#[tracing::instrument(skip(state, caller, headers))]
pub async fn delete_handler(
    State(state): State<ServiceState>,
    Caller(caller): Caller,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let descriptor = resource_from_uri(&uri, "")?;
    let preconditions = preconditions(&headers)?;
    state
        .resources()
        .delete(&caller, &descriptor, &preconditions)
        .await?;
    Ok(StatusCode::OK.into_response())
}

/// Item metadata as JSON, with its fingerprint echoed as the `ETag`.
pub(crate) fn item_response(item: ItemMetadata) -> Response {
    let etag = item.etag.clone();
    (StatusCode::OK, [(ETAG, etag)], Json(item)).into_response()
}
