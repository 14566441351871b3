//! Integration tests for resource change subscriptions

mod common;

use std::time::Duration;

use ::common::prelude::*;
use futures::StreamExt;

use crate::common::{body, setup_test_env};

#[tokio::test]
async fn test_create_update_delete_in_order() {
    let env = setup_test_env().await;
    let identity = env.identity("proxyKey1");
    let file = env.own("proxyKey1", ResourceType::File, "folder/watched.txt");
    let subscription = env
        .service
        .subscribe(&identity, vec![file.clone()])
        .unwrap();

    for data in [&b"one"[..], b"two"] {
        env.service
            .upload(&identity, &file, body(data), None, &Preconditions::default())
            .await
            .unwrap();
    }
    env.service
        .delete(&identity, &file, &Preconditions::default())
        .await
        .unwrap();

    let events: Vec<ResourceEvent> = tokio::time::timeout(
        Duration::from_secs(1),
        subscription.into_stream().take(3).collect(),
    )
    .await
    .unwrap();
    let actions: Vec<_> = events.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            ResourceEventAction::Create,
            ResourceEventAction::Update,
            ResourceEventAction::Delete
        ]
    );
    assert!(events.iter().all(|e| e.url == file.url()));
    assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn test_folder_subscription() {
    let env = setup_test_env().await;
    let identity = env.identity("proxyKey1");
    let folder = env.own("proxyKey1", ResourceType::Conversation, "chats/");
    let subscription = env.service.subscribe(&identity, vec![folder]).unwrap();

    let chat = env.own("proxyKey1", ResourceType::Conversation, "chats/c1");
    env.service
        .put_document(&identity, &chat, bytes::Bytes::from_static(b"{}"), &Preconditions::default())
        .await
        .unwrap();

    let event = subscription.recv().await.unwrap();
    assert_eq!(event.url, chat.url());
    assert_eq!(event.action, ResourceEventAction::Create);
}

#[tokio::test]
async fn test_subscribe_requires_read() {
    let env = setup_test_env().await;
    let identity = env.identity("proxyKey1");
    let foreign = env.own("proxyKey2", ResourceType::File, "a.txt");
    let err = env.service.subscribe(&identity, vec![foreign]).unwrap_err();
    assert!(matches!(err, ResourceError::AccessDenied(_)));
}
