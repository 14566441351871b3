use std::convert::Infallible;

use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde::Deserialize;

use crate::http::auth::Caller;
use crate::http::error::ApiError;
use crate::ServiceState;
use common::prelude::ResourceDescriptor;

#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeRequest {
    pub resources: Vec<SubscribedResource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscribedResource {
    pub url: String,
}

/// Stream one JSON event per change to any subscribed item or folder.
#[tracing::instrument(skip(state, caller))]
pub async fn handler(
    State(state): State<ServiceState>,
    Caller(caller): Caller,
    Json(req): Json<SubscribeRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let targets = req
        .resources
        .iter()
        .map(|r| ResourceDescriptor::parse(&r.url))
        .collect::<Result<Vec<_>, _>>()?;
    if targets.is_empty() {
        return Err(ApiError::bad_request("No resources to subscribe to"));
    }

    let subscription = state.resources().subscribe(&caller, targets)?;
    tracing::info!(subscription = %subscription.id(), "resource subscription opened");

    let events = subscription.into_stream().filter_map(|event| async move {
        match Event::default().json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(e) => {
                tracing::warn!(url = %event.url, "failed to encode event: {}", e);
                None
            }
        }
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
