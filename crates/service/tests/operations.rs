//! HTTP integration tests for metadata, delegation, publication and events

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::StreamExt;
use serde_json::json;

use crate::common::*;

#[tokio::test]
async fn test_folder_metadata() {
    let (router, _) = setup_test_env();
    let root = format!("/v1/metadata/files/{}/?permissions=true", BUCKET1);

    let response = send(&router, get("proxyKey1", &root)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "nodeType": "FOLDER",
            "resourceType": "FILE",
            "bucket": BUCKET1,
            "name": null,
            "parentPath": null,
            "url": format!("files/{}/", BUCKET1),
            "items": [],
            "permissions": ["READ", "WRITE"]
        })
    );

    for path in ["file.txt", "folder1/file.txt"] {
        let url = format!("files/{}/{}", BUCKET1, path);
        send(&router, put_file("proxyKey1", &url, TEST_FILE_CONTENT, None)).await;
    }

    let listing = body_json(send(&router, get("proxyKey1", &root)).await).await;
    let items = listing["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["nodeType"], "ITEM");
    assert_eq!(items[0]["url"], format!("files/{}/file.txt", BUCKET1));
    assert_eq!(items[0]["etag"], TEST_FILE_ETAG);
    assert_eq!(items[1]["nodeType"], "FOLDER");
    assert_eq!(items[1]["url"], format!("files/{}/folder1/", BUCKET1));
    assert_eq!(items[1]["name"], "folder1");

    let recursive = format!("/v1/metadata/files/{}/?recursive=true", BUCKET1);
    let listing = body_json(send(&router, get("proxyKey1", &recursive)).await).await;
    let urls: Vec<_> = listing["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["url"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        urls,
        vec![
            format!("files/{}/file.txt", BUCKET1),
            format!("files/{}/folder1/file.txt", BUCKET1)
        ]
    );

    let missing = format!("/v1/metadata/files/{}/nothing/", BUCKET1);
    let response = send(&router, get("proxyKey1", &missing)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metadata_media_type() {
    let (router, _) = setup_test_env();
    let url = format!("files/{}/file.txt", BUCKET1);
    send(&router, put_file("proxyKey1", &url, TEST_FILE_CONTENT, None)).await;

    let request = Request::get(format!("/v1/metadata/{}", url))
        .header("Api-Key", "proxyKey1")
        .header("Accept", "application/vnd.stash.metadata+json")
        .body(Body::empty())
        .unwrap();
    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "application/vnd.stash.metadata+json"
    );
    let item = body_json(response).await;
    assert_eq!(item["nodeType"], "ITEM");
    assert!(item.get("permissions").is_none());
}

#[tokio::test]
async fn test_delegate_key() {
    let (router, _) = setup_test_env();
    let shared = format!("files/{}/folder1/shared.txt", BUCKET1);
    send(&router, put_file("proxyKey1", &shared, TEST_FILE_CONTENT, None)).await;

    let response = send(
        &router,
        post_json(
            "proxyKey1",
            "/v1/ops/api-key/delegate",
            json!({"attachedFiles": {shared.clone(): {"accessTypes": ["READ"]}}}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let issued = body_json(response).await;
    assert_eq!(issued["expiresInSecs"], 60);
    let key = issued["apiKey"].as_str().unwrap().to_string();

    // the delegate works in the issuer's bucket
    let response = send(&router, get(&key, &format!("/v1/{}", shared))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, TEST_FILE_CONTENT);
    let response = send(&router, get(&key, "/v1/bucket")).await;
    assert_eq!(body_json(response).await["bucket"], BUCKET1);

    // grants can't exceed what the issuer has
    let response = send(
        &router,
        post_json(
            "proxyKey1",
            "/v1/ops/api-key/delegate",
            json!({"attachedFiles": {format!("files/{}/x.txt", BUCKET2): {"accessTypes": ["READ"]}}}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &router,
        post_json(
            "proxyKey1",
            "/v1/ops/api-key/delegate",
            json!({"attachedFolders": {shared.clone(): {"accessTypes": ["READ"]}}}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // per-request keys can't issue more keys
    let response = send(
        &router,
        post_json(&key, "/v1/ops/api-key/delegate", json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_app_data_of_another_bucket() {
    let (router, _) = setup_test_env();
    let response = send(
        &router,
        post_json(
            "proxyKey2",
            "/v1/ops/api-key/delegate",
            json!({"sourceDeployment": "EPM-RTC-RAIL"}),
        ),
    )
    .await;
    let key = body_json(response).await["apiKey"]
        .as_str()
        .unwrap()
        .to_string();

    let response = send(&router, get(&key, "/v1/bucket")).await;
    assert_eq!(
        body_json(response).await,
        json!({"bucket": BUCKET2, "appdata": format!("{}/appdata/EPM-RTC-RAIL", BUCKET2)})
    );

    let foreign = format!("files/{}/appdata/EPM-RTC-RAIL/file.txt", BUCKET1);
    let response = send(&router, put_file(&key, &foreign, TEST_FILE_CONTENT, None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_text(response).await,
        format!("You don't have an access to: {}", foreign)
    );
}

#[tokio::test]
async fn test_publication_copy() {
    let (router, _) = setup_test_env();
    let source = format!("files/{}/report.txt", BUCKET1);
    send(&router, put_file("proxyKey1", &source, TEST_FILE_CONTENT, None)).await;

    let response = send(
        &router,
        post_json(
            "proxyKey1",
            "/v1/ops/publication/copy",
            json!({"sourceUrl": source, "targetUrl": "files/public/reports/report.txt"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["etag"], TEST_FILE_ETAG);

    let response = send(&router, get("proxyKey2", "/v1/files/public/reports/report.txt")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, TEST_FILE_CONTENT);

    // readable by everyone, writable by no one
    let response = send(
        &router,
        put_file("proxyKey2", "files/public/reports/report.txt", "overwrite", None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_subscription_stream() {
    let (router, _) = setup_test_env();
    let url = format!("files/{}/watched.txt", BUCKET1);

    let response = send(
        &router,
        post_json(
            "proxyKey1",
            "/v1/ops/resource/subscribe",
            json!({"resources": [{"url": url}]}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    let mut events = response.into_body().into_data_stream();

    send(&router, put_file("proxyKey1", &url, TEST_FILE_CONTENT, None)).await;

    let frame = tokio::time::timeout(std::time::Duration::from_secs(1), events.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let frame = String::from_utf8(frame.to_vec()).unwrap();
    let data = frame
        .lines()
        .find_map(|line| line.strip_prefix("data: "))
        .unwrap();
    let event: serde_json::Value = serde_json::from_str(data).unwrap();
    assert_eq!(event["url"], url);
    assert_eq!(event["action"], "CREATE");
}

#[tokio::test]
async fn test_subscription_requires_read() {
    let (router, _) = setup_test_env();
    let response = send(
        &router,
        post_json(
            "proxyKey1",
            "/v1/ops/resource/subscribe",
            json!({"resources": [{"url": format!("files/{}/", BUCKET2)}]}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
