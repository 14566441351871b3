use axum::http::{HeaderMap, Uri};
use axum::routing::{get, post};
use axum::Router;
use common::prelude::{Preconditions, ResourceDescriptor, ResourceType};
use http::header::{HeaderName, IF_MATCH, IF_NONE_MATCH};

pub mod bucket;
pub mod metadata;
pub mod ops;
pub mod resource;

use crate::http::error::ApiError;
use crate::ServiceState;

const V1_PREFIX: &str = "/v1/";

pub fn router(state: ServiceState) -> Router<ServiceState> {
    let mut router = Router::new()
        .route("/bucket", get(bucket::handler))
        .route("/metadata/*path", get(metadata::handler))
        .route("/ops/resource/subscribe", post(ops::subscribe::handler))
        .route("/ops/api-key/delegate", post(ops::delegate::handler))
        .route("/ops/publication/copy", post(ops::publication::handler));

    for resource_type in ResourceType::ALL {
        router = router.route(
            &format!("/{}/*path", resource_type.group()),
            get(resource::get_handler)
                .put(resource::put_handler)
                .delete(resource::delete_handler),
        );
    }

    router.with_state(state)
}

/// Parse the resource URL out of the raw request path, after `prefix`.
///
/// The path is taken still percent-encoded so segment boundaries survive.
pub(crate) fn resource_from_uri(uri: &Uri, prefix: &str) -> Result<ResourceDescriptor, ApiError> {
    let path = uri
        .path()
        .strip_prefix(V1_PREFIX)
        .and_then(|rest| rest.strip_prefix(prefix))
        .ok_or_else(|| ApiError::bad_request(format!("Invalid resource url: {}", uri.path())))?;
    Ok(ResourceDescriptor::parse(path)?)
}

/// `If-Match` / `If-None-Match`, compared verbatim.
pub(crate) fn preconditions(headers: &HeaderMap) -> Result<Preconditions, ApiError> {
    let header = |name: HeaderName| -> Result<Option<String>, ApiError> {
        headers
            .get(&name)
            .map(|v| {
                v.to_str()
                    .map(|s| s.trim().to_string())
                    .map_err(|_| ApiError::bad_request(format!("Invalid {} header", name)))
            })
            .transpose()
    };
    Ok(Preconditions {
        if_match: header(IF_MATCH)?,
        if_none_match: header(IF_NONE_MATCH)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUCKET: &str = "WLlg6FmcTmKqUbYsfAGqYeRxbpYH-5OJVbrKnOIbckw";

    #[test]
    fn test_resource_from_uri_keeps_encoding() {
        let uri: Uri = format!("/v1/files/{}/my%20folder/r%C3%A9sum%C3%A9.txt", BUCKET)
            .parse()
            .unwrap();
        let descriptor = resource_from_uri(&uri, "").unwrap();
        assert_eq!(descriptor.name(), Some("résumé.txt"));
        assert_eq!(descriptor.parent_path(), ["my folder".to_string()]);

        let uri: Uri = format!("/v1/metadata/files/{}/", BUCKET).parse().unwrap();
        let descriptor = resource_from_uri(&uri, "metadata/").unwrap();
        assert!(descriptor.is_root());

        // a slash smuggled into a segment is rejected
        let uri: Uri = format!("/v1/files/{}/a%2Fb.txt", BUCKET).parse().unwrap();
        assert!(resource_from_uri(&uri, "").is_err());
    }

    #[test]
    fn test_invalid_bucket() {
        let uri: Uri = "/v1/files/testbucket/".parse().unwrap();
        let err = resource_from_uri(&uri, "").unwrap_err();
        assert_eq!(err.to_string(), "Url has invalid bucket: files/testbucket/");
    }

    #[test]
    fn test_preconditions() {
        let mut headers = HeaderMap::new();
        assert!(preconditions(&headers).unwrap().is_empty());

        headers.insert(IF_MATCH, " abc ".parse().unwrap());
        headers.insert(IF_NONE_MATCH, "*".parse().unwrap());
        let parsed = preconditions(&headers).unwrap();
        assert_eq!(parsed.if_match.as_deref(), Some("abc"));
        assert_eq!(parsed.if_none_match.as_deref(), Some("*"));
    }
}
