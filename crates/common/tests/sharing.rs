//! Integration tests for access through per-request key grants

mod common;

use ::common::prelude::*;

use crate::common::{body, read, setup_test_env};

#[tokio::test]
async fn test_file_grant() {
    let env = setup_test_env().await;
    let owner = env.identity("proxyKey1");
    let shared = env.own("proxyKey1", ResourceType::File, "folder1/shared.txt");
    let private = env.own("proxyKey1", ResourceType::File, "folder1/private.txt");
    for target in [&shared, &private] {
        env.service
            .upload(&owner, target, body(b"hello"), None, &Preconditions::default())
            .await
            .unwrap();
    }

    let record = env.auth.delegations().issue(
        "proxyKey2",
        None,
        [(shared.clone(), ResourceAccess::READ)],
        [],
    );
    let delegate = env.identity(&record.per_request_key);

    let download = env.service.download(&delegate, &shared).await.unwrap();
    assert_eq!(read(download).await, b"hello");

    let err = env.service.download(&delegate, &private).await.err().unwrap();
    assert_eq!(err.status_code(), http::StatusCode::FORBIDDEN);
    assert_eq!(
        err.to_string(),
        format!("You don't have an access to: {}", private.url())
    );

    // read-only grant
    let err = env
        .service
        .upload(&delegate, &shared, body(b"changed"), None, &Preconditions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ResourceError::AccessDenied(_)));
}

#[tokio::test]
async fn test_folder_grant() {
    let env = setup_test_env().await;
    let owner = env.identity("proxyKey1");
    let inside = env.own("proxyKey1", ResourceType::File, "team/deep/a.txt");
    env.service
        .upload(&owner, &inside, body(b"a"), None, &Preconditions::default())
        .await
        .unwrap();

    let folder = env.own("proxyKey1", ResourceType::File, "team/");
    let record = env
        .auth
        .delegations()
        .issue("proxyKey2", None, [], [(folder.clone(), ResourceAccess::ALL)]);
    let delegate = env.identity(&record.per_request_key);

    env.service.download(&delegate, &inside).await.unwrap();
    let written = env.own("proxyKey1", ResourceType::File, "team/new.txt");
    env.service
        .upload(&delegate, &written, body(b"new"), None, &Preconditions::default())
        .await
        .unwrap();

    // a sibling sharing the prefix text is not inside the folder
    let sibling = env.own("proxyKey1", ResourceType::File, "teammate/x.txt");
    let err = env.service.download(&delegate, &sibling).await.err().unwrap();
    assert_eq!(err.status_code(), http::StatusCode::FORBIDDEN);

    let listing = env
        .service
        .metadata(
            &delegate,
            &folder,
            MetadataOptions {
                permissions: true,
                recursive: true,
            },
        )
        .await
        .unwrap();
    let ResourceMetadata::Folder(listing) = listing else {
        panic!("expected folder");
    };
    assert_eq!(listing.items.len(), 2);
    assert_eq!(listing.permissions, Some(ResourceAccess::ALL));
}

#[tokio::test]
async fn test_foreign_app_data_denied() {
    let env = setup_test_env().await;
    let owner = env.identity("proxyKey1");
    let app_file = env.own("proxyKey1", ResourceType::File, "appdata/app1/state.json");
    env.service
        .upload(&owner, &app_file, body(b"{}"), None, &Preconditions::default())
        .await
        .unwrap();

    // a deployment acting for another key has its own app-data path only
    let record = env
        .auth
        .delegations()
        .issue("proxyKey2", Some("app1".to_string()), [], []);
    let app = env.identity(&record.per_request_key);
    let err = env.service.download(&app, &app_file).await.err().unwrap();
    assert_eq!(err.status_code(), http::StatusCode::FORBIDDEN);

    let own_app_file = env.own("proxyKey2", ResourceType::File, "appdata/app1/state.json");
    env.service
        .upload(&app, &own_app_file, body(b"{}"), None, &Preconditions::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_public_bucket_read_only() {
    let env = setup_test_env().await;
    let identity = env.identity("proxyKey1");
    let public = common::descriptor(ResourceType::File, PUBLIC_BUCKET, "x.txt");

    let err = env
        .service
        .upload(&identity, &public, body(b"x"), None, &Preconditions::default())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), http::StatusCode::FORBIDDEN);

    let err = env.service.download(&identity, &public).await.err().unwrap();
    assert_eq!(err.status_code(), http::StatusCode::NOT_FOUND);
}
