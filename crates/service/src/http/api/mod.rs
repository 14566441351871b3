use axum::Router;
use http::header::{ACCEPT, CONTENT_TYPE, ETAG, IF_MATCH, IF_NONE_MATCH, ORIGIN};
use http::{HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};

pub mod v1;

use super::auth::API_KEY_HEADER;
use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    let cors_layer = CorsLayer::new()
        .allow_methods(vec![Method::GET, Method::PUT, Method::DELETE, Method::POST])
        .allow_headers(vec![
            ACCEPT,
            CONTENT_TYPE,
            ORIGIN,
            IF_MATCH,
            IF_NONE_MATCH,
            HeaderName::from_static(API_KEY_HEADER),
        ])
        .expose_headers(vec![ETAG])
        .allow_origin(Any)
        .allow_credentials(false);

    Router::new()
        .nest("/v1", v1::router(state.clone()))
        .with_state(state)
        .layer(cors_layer)
}
