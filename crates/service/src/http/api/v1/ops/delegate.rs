use std::collections::HashMap;

use axum::extract::{Json, State};
use axum::response::{IntoResponse, Response};
use common::access;
use common::prelude::{Identity, ResourceAccess, ResourceDescriptor, ShareGrant};
use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::http::auth::Caller;
use crate::http::error::ApiError;
use crate::ServiceState;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DelegateRequest {
    /// Deployment the key is issued for; gives the key an app-data path
    pub source_deployment: Option<String>,
    /// File URL to the access granted on it
    pub attached_files: HashMap<String, ShareGrant>,
    /// Folder URL to the access granted on everything below it
    pub attached_folders: HashMap<String, ShareGrant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateResponse {
    pub api_key: String,
    pub expires_in_secs: u64,
}

/// Issue a per-request key for the calling original key.
///
/// Every grant must be covered by what the caller itself may do there.
#[tracing::instrument(skip(state, caller, req))]
pub async fn handler(
    State(state): State<ServiceState>,
    Caller(caller): Caller,
    Json(req): Json<DelegateRequest>,
) -> Result<Response, ApiError> {
    if !caller.is_original() {
        return Err(ApiError::Forbidden(
            "Per-request keys can't issue per-request keys".to_string(),
        ));
    }

    let files = grants(&caller, req.attached_files, false)?;
    let folders = grants(&caller, req.attached_folders, true)?;
    let record = state.delegations().issue(
        caller.original_key(),
        req.source_deployment,
        files,
        folders,
    );
    tracing::info!(
        files = record.attached_files.len(),
        folders = record.attached_folders.len(),
        deployment = ?record.source_deployment,
        "issued per-request key"
    );

    Ok((
        StatusCode::OK,
        axum::Json(DelegateResponse {
            api_key: record.per_request_key.clone(),
            expires_in_secs: state.delegations().ttl().as_secs(),
        }),
    )
        .into_response())
}

fn grants(
    caller: &Identity,
    requested: HashMap<String, ShareGrant>,
    folders: bool,
) -> Result<Vec<(ResourceDescriptor, ResourceAccess)>, ApiError> {
    requested
        .into_iter()
        .map(|(url, grant)| -> Result<_, ApiError> {
            let descriptor = ResourceDescriptor::parse(&url)?;
            if descriptor.is_folder() != folders {
                let expected = if folders { "a folder" } else { "a file" };
                return Err(ApiError::bad_request(format!("Url must name {}: {}", expected, url)));
            }
            access::require(&descriptor, caller, grant.access_types)?;
            Ok((descriptor, grant.access_types))
        })
        .collect()
}
