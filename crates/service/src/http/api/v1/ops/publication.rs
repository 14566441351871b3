use std::collections::HashMap;

use axum::extract::{Json, State};
use axum::response::Response;
use common::prelude::{PublicationRequest, ResourceDescriptor};
use serde::Deserialize;

use super::super::resource::item_response;
use crate::http::auth::Caller;
use crate::http::error::ApiError;
use crate::ServiceState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyRequest {
    pub source_url: String,
    pub target_url: String,
    /// Attachment URL in the source to its published URL
    #[serde(default)]
    pub attachments: HashMap<String, String>,
    #[serde(default)]
    pub preserve_reference: bool,
}

/// Copy a resource into the public bucket.
#[tracing::instrument(skip(state, caller))]
pub async fn handler(
    State(state): State<ServiceState>,
    Caller(caller): Caller,
    Json(req): Json<CopyRequest>,
) -> Result<Response, ApiError> {
    let request = PublicationRequest {
        source: ResourceDescriptor::parse(&req.source_url)?,
        target: ResourceDescriptor::parse(&req.target_url)?,
        attachments: req.attachments,
        preserve_reference: req.preserve_reference,
    };
    let item = state.resources().publish(&caller, request).await?;
    Ok(item_response(item))
}
