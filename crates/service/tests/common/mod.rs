//! Shared test utilities for HTTP integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use blob_store::BlobStore;
use ::common::prelude::*;
use service::ServiceState;
use tower::ServiceExt;

pub const BUCKET1: &str = "WLlg6FmcTmKqUbYsfAGqYeRxbpYH-5OJVbrKnOIbckw";
pub const BUCKET2: &str = "15sfbZm-qqWlR3N2YNGjAcQUCgCN5LbcfNxsLXb33vM";

pub const TEST_FILE_CONTENT: &str = "Test file content";
pub const TEST_FILE_ETAG: &str = "6c76f7bd4b84eb68c26d2e8f48ea76f90b9bdf8836e27235a0ca4325f8fe4ce5";

const BOUNDARY: &str = "stash-test-boundary";

/// Set up a router over an in-memory blob store that knows `proxyKey1`
/// and `proxyKey2`.
pub fn setup_test_env() -> (Router, ServiceState) {
    let resources = ResourceService::new(
        BlobStore::memory(),
        UploadConfig {
            part_size: 64,
            max_in_flight: 2,
        },
        EventPublisher::new(),
    );
    let auth = Authenticator::new(
        BucketResolver::new("test-secret").unwrap(),
        Arc::new(DelegationStore::new(Duration::from_secs(60))),
        [
            ("proxyKey1".to_string(), Some("EPM-RTC-GPT".to_string())),
            ("proxyKey2".to_string(), None),
        ],
    );
    let state = ServiceState::new(resources, auth);
    (service::http::router(state.clone()), state)
}

pub fn multipart(file_name: &str, content: &str, content_type: Option<&str>) -> (String, Body) {
    let mut body = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"attachment\"; filename=\"{}\"\r\n",
        BOUNDARY, file_name
    );
    if let Some(content_type) = content_type {
        body.push_str(&format!("Content-Type: {}\r\n", content_type));
    }
    body.push_str(&format!("\r\n{}\r\n--{}--\r\n", content, BOUNDARY));
    (
        format!("multipart/form-data; boundary={}", BOUNDARY),
        Body::from(body),
    )
}

pub fn put_file(key: &str, url: &str, content: &str, content_type: Option<&str>) -> Request<Body> {
    let (form_type, body) = multipart("file.txt", content, content_type);
    Request::put(format!("/v1/{}", url))
        .header("Api-Key", key)
        .header("Content-Type", form_type)
        .body(body)
        .unwrap()
}

pub fn get(key: &str, uri: &str) -> Request<Body> {
    Request::get(uri)
        .header("Api-Key", key)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(key: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("Api-Key", key)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}
