//! Shared test utilities for resource service integration tests
#![allow(dead_code)]

use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ::common::prelude::*;
use blob_store::{BlobStore, BlobStoreConfig};
use bytes::Bytes;
use futures::{stream, Stream, TryStreamExt};
use tempfile::TempDir;

pub const PART_SIZE: usize = 64;

pub struct TestEnv {
    pub service: ResourceService,
    pub auth: Authenticator,
    temp: TempDir,
}

impl TestEnv {
    pub fn identity(&self, key: &str) -> Identity {
        self.auth.authenticate(key).unwrap()
    }

    /// A descriptor under `key`'s own bucket.
    pub fn own(&self, key: &str, resource_type: ResourceType, path: &str) -> ResourceDescriptor {
        let bucket = self.auth.resolver().bucket_id(key);
        descriptor(resource_type, &bucket, path)
    }

    /// Files under the blob store's `data/` directory, including any
    /// multi-part staging files.
    pub fn data_files(&self) -> usize {
        fn count(dir: &Path) -> usize {
            std::fs::read_dir(dir)
                .map(|entries| {
                    entries
                        .flatten()
                        .map(|entry| {
                            let path = entry.path();
                            if path.is_dir() {
                                count(&path)
                            } else {
                                1
                            }
                        })
                        .sum()
                })
                .unwrap_or(0)
        }
        count(&self.temp.path().join("blobs").join("data"))
    }
}

/// Set up a service over a local-filesystem blob store, with two original
/// keys and a small part size so multi-part uploads are cheap to trigger.
pub async fn setup_test_env() -> TestEnv {
    setup_test_env_with_part_size(PART_SIZE).await
}

pub async fn setup_test_env_with_part_size(part_size: usize) -> TestEnv {
    let temp = TempDir::new().unwrap();
    let blobs = BlobStore::new(BlobStoreConfig::Local {
        path: temp.path().join("blobs"),
    })
    .await
    .unwrap();

    let service = ResourceService::new(
        blobs,
        UploadConfig {
            part_size,
            max_in_flight: 2,
        },
        EventPublisher::new(),
    );
    let auth = Authenticator::new(
        BucketResolver::new("test-secret").unwrap(),
        Arc::new(DelegationStore::new(Duration::from_secs(60))),
        [
            ("proxyKey1".to_string(), None),
            ("proxyKey2".to_string(), None),
        ],
    );

    TestEnv {
        service,
        auth,
        temp,
    }
}

pub fn descriptor(resource_type: ResourceType, bucket: &str, path: &str) -> ResourceDescriptor {
    ResourceDescriptor::parse(&format!("{}/{}/{}", resource_type.group(), bucket, path)).unwrap()
}

pub fn body(data: &[u8]) -> impl Stream<Item = Result<Bytes, Infallible>> {
    stream::iter(vec![Ok(Bytes::copy_from_slice(data))])
}

pub fn chunked(data: &[u8], size: usize) -> impl Stream<Item = Result<Bytes, Infallible>> {
    let chunks: Vec<_> = data
        .chunks(size)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    stream::iter(chunks)
}

pub async fn read(download: Download) -> Vec<u8> {
    let chunks: Vec<Bytes> = download.content.try_collect().await.unwrap();
    chunks.concat()
}
