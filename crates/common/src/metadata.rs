//! Item and folder metadata.

use blob_store::{BlobRecord, BlobStore};
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

use crate::access::{self, ResourceAccess};
use crate::error::ResourceError;
use crate::identity::Identity;
use crate::resource::{ResourceDescriptor, ResourceType};

/// Media type a client can `Accept` to ask explicitly for metadata.
pub const METADATA_MEDIA_TYPE: &str = "application/vnd.stash.metadata+json";

const RECORD_FETCH_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "nodeType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceMetadata {
    Item(ItemMetadata),
    Folder(FolderMetadata),
}

impl ResourceMetadata {
    pub fn url(&self) -> &str {
        match self {
            ResourceMetadata::Item(item) => &item.url,
            ResourceMetadata::Folder(folder) => &folder.url,
        }
    }

    fn set_permissions(&mut self, permissions: ResourceAccess) {
        match self {
            ResourceMetadata::Item(item) => item.permissions = Some(permissions),
            ResourceMetadata::Folder(folder) => folder.permissions = Some(permissions),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMetadata {
    pub resource_type: ResourceType,
    pub bucket: String,
    pub name: String,
    pub parent_path: Option<String>,
    pub url: String,
    pub content_length: u64,
    pub content_type: String,
    /// Content fingerprint
    pub etag: String,
    /// Milliseconds since the epoch
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<ResourceAccess>,
}

impl ItemMetadata {
    pub fn from_record(descriptor: &ResourceDescriptor, record: &BlobRecord) -> Self {
        Self {
            resource_type: descriptor.resource_type(),
            bucket: descriptor.bucket().to_string(),
            name: descriptor.name().unwrap_or_default().to_string(),
            parent_path: descriptor.parent_path_string(),
            url: descriptor.url(),
            content_length: record.content_length,
            content_type: record.content_type.clone(),
            etag: record.fingerprint.clone(),
            updated_at: record.updated_at.timestamp_millis(),
            permissions: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderMetadata {
    pub resource_type: ResourceType,
    pub bucket: String,
    /// `None` for a bucket root
    pub name: Option<String>,
    pub parent_path: Option<String>,
    pub url: String,
    pub items: Vec<ResourceMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<ResourceAccess>,
}

impl FolderMetadata {
    fn new(descriptor: &ResourceDescriptor, items: Vec<ResourceMetadata>) -> Self {
        Self {
            resource_type: descriptor.resource_type(),
            bucket: descriptor.bucket().to_string(),
            name: descriptor.name().map(str::to_string),
            parent_path: descriptor.parent_path_string(),
            url: descriptor.url(),
            items,
            permissions: None,
        }
    }
}

/// How a metadata lookup should be shaped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataOptions {
    /// Attach the caller's effective permissions to every entry
    pub permissions: bool,
    /// List every descendant item instead of direct children
    pub recursive: bool,
}

/// Builds metadata from index records.
#[derive(Debug, Clone)]
pub struct MetadataResolver {
    blobs: BlobStore,
}

impl MetadataResolver {
    pub fn new(blobs: BlobStore) -> Self {
        Self { blobs }
    }

    pub async fn get_item(&self, descriptor: &ResourceDescriptor) -> Result<ItemMetadata, ResourceError> {
        match self.blobs.record(&descriptor.storage_key()).await? {
            Some(record) => Ok(ItemMetadata::from_record(descriptor, &record)),
            None => Err(ResourceError::NotFound(descriptor.url())),
        }
    }

    /// List a folder.
    ///
    /// Direct children come back with folders as entries of their own; a
    /// recursive listing holds only items. Entries are sorted by URL. A folder
    /// with nothing below it doesn't exist, except for a bucket root.
    pub async fn list_folder(
        &self,
        descriptor: &ResourceDescriptor,
        recursive: bool,
    ) -> Result<FolderMetadata, ResourceError> {
        let key = descriptor.storage_key();
        let (item_descriptors, folder_descriptors) = if recursive {
            let items = self
                .blobs
                .list_recursive(&key)
                .await?
                .iter()
                .map(|relative| descriptor.descendant(relative))
                .collect::<Result<Vec<_>, _>>()?;
            (items, Vec::new())
        } else {
            let listing = self.blobs.list(&key).await?;
            let items = listing
                .items
                .iter()
                .map(|name| descriptor.child(name, false))
                .collect::<Result<Vec<_>, _>>()?;
            let folders = listing
                .folders
                .iter()
                .map(|name| descriptor.child(name, true))
                .collect::<Result<Vec<_>, _>>()?;
            (items, folders)
        };

        let mut entries: Vec<ResourceMetadata> = futures::stream::iter(item_descriptors)
            .map(|child| async move {
                let record = self.blobs.record(&child.storage_key()).await?;
                Ok::<_, ResourceError>(
                    record.map(|record| ResourceMetadata::Item(ItemMetadata::from_record(&child, &record))),
                )
            })
            .buffered(RECORD_FETCH_CONCURRENCY)
            .try_filter_map(|entry| async move { Ok(entry) })
            .try_collect()
            .await?;
        entries.extend(
            folder_descriptors
                .iter()
                .map(|child| ResourceMetadata::Folder(FolderMetadata::new(child, Vec::new()))),
        );
        entries.sort_by(|a, b| a.url().cmp(b.url()));

        if entries.is_empty() && !descriptor.is_root() {
            return Err(ResourceError::NotFound(descriptor.url()));
        }
        Ok(FolderMetadata::new(descriptor, entries))
    }

    /// Item or folder metadata as seen by `identity`, which must already be
    /// allowed to read `descriptor`.
    pub async fn resolve(
        &self,
        descriptor: &ResourceDescriptor,
        identity: &Identity,
        options: MetadataOptions,
    ) -> Result<ResourceMetadata, ResourceError> {
        if !descriptor.is_folder() {
            let mut item = ResourceMetadata::Item(self.get_item(descriptor).await?);
            if options.permissions {
                item.set_permissions(access::evaluate(descriptor, identity)?);
            }
            return Ok(item);
        }

        let mut folder = self.list_folder(descriptor, options.recursive).await?;
        if options.permissions {
            folder.permissions = Some(access::evaluate(descriptor, identity)?);
            folder.items = std::mem::take(&mut folder.items)
                .into_iter()
                .filter_map(|mut entry| {
                    let child = ResourceDescriptor::parse(entry.url()).ok()?;
                    // entries the caller can't see are dropped
                    let permissions = access::evaluate(&child, identity).ok()?;
                    entry.set_permissions(permissions);
                    Some(entry)
                })
                .collect();
        }
        Ok(ResourceMetadata::Folder(folder))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::identity::BucketResolver;

    async fn put(blobs: &BlobStore, descriptor: &ResourceDescriptor, data: &'static [u8]) {
        let blob_id = blobs.put_blob(Bytes::from_static(data)).await.unwrap();
        let record = BlobRecord::new(
            blob_id,
            "text/plain",
            data.len() as u64,
            crate::upload::fingerprint(data),
        );
        blobs.commit(&descriptor.storage_key(), &record).await.unwrap();
    }

    fn setup() -> (MetadataResolver, BlobStore, Identity) {
        let blobs = BlobStore::memory();
        let resolver = BucketResolver::new("test-secret").unwrap();
        let identity = Identity::original(&resolver, "proxyKey1", None);
        (MetadataResolver::new(blobs.clone()), blobs, identity)
    }

    fn descriptor(identity: &Identity, path: &str) -> ResourceDescriptor {
        ResourceDescriptor::parse(&format!("files/{}/{}", identity.owner_bucket(), path)).unwrap()
    }

    #[tokio::test]
    async fn test_item_metadata() {
        let (metadata, blobs, identity) = setup();
        let file = descriptor(&identity, "folder1/my%20file.txt");
        put(&blobs, &file, b"Test file content").await;

        let item = metadata.get_item(&file).await.unwrap();
        assert_eq!(item.name, "my file.txt");
        assert_eq!(item.parent_path.as_deref(), Some("folder1"));
        assert_eq!(item.url, file.url());
        assert_eq!(item.content_length, 17);
        assert_eq!(item.content_type, "text/plain");
        assert_eq!(
            item.etag,
            "6c76f7bd4b84eb68c26d2e8f48ea76f90b9bdf8836e27235a0ca4325f8fe4ce5"
        );

        let missing = descriptor(&identity, "folder1/nope.txt");
        assert!(matches!(
            metadata.get_item(&missing).await,
            Err(ResourceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_folder_listing_is_sorted_and_direct() {
        let (metadata, blobs, identity) = setup();
        for path in ["b.txt", "a.txt", "sub/c.txt", "sub/deeper/d.txt"] {
            put(&blobs, &descriptor(&identity, path), b"x").await;
        }

        let root = descriptor(&identity, "");
        let folder = metadata.list_folder(&root, false).await.unwrap();
        let urls: Vec<&str> = folder.items.iter().map(|e| e.url()).collect();
        assert_eq!(
            urls,
            vec![
                descriptor(&identity, "a.txt").url(),
                descriptor(&identity, "b.txt").url(),
                descriptor(&identity, "sub/").url(),
            ]
        );
        assert!(matches!(folder.items[2], ResourceMetadata::Folder(_)));
        assert_eq!(folder.name, None);
        assert_eq!(folder.parent_path, None);

        let recursive = metadata.list_folder(&root, true).await.unwrap();
        assert_eq!(recursive.items.len(), 4);
        assert!(recursive
            .items
            .iter()
            .all(|e| matches!(e, ResourceMetadata::Item(_))));
    }

    #[tokio::test]
    async fn test_empty_folders() {
        let (metadata, _, identity) = setup();
        let root = metadata
            .list_folder(&descriptor(&identity, ""), false)
            .await
            .unwrap();
        assert!(root.items.is_empty());

        assert!(matches!(
            metadata.list_folder(&descriptor(&identity, "nothing/"), false).await,
            Err(ResourceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_permissions_attached() {
        let (metadata, blobs, identity) = setup();
        put(&blobs, &descriptor(&identity, "docs/a.txt"), b"x").await;

        let options = MetadataOptions {
            permissions: true,
            recursive: false,
        };
        let resolved = metadata
            .resolve(&descriptor(&identity, "docs/"), &identity, options)
            .await
            .unwrap();
        let ResourceMetadata::Folder(folder) = resolved else {
            panic!("expected folder");
        };
        assert_eq!(folder.permissions, Some(ResourceAccess::ALL));
        assert_eq!(folder.items.len(), 1);

        let json = serde_json::to_value(&folder.items[0]).unwrap();
        assert_eq!(json["nodeType"], "ITEM");
        assert_eq!(json["resourceType"], "FILE");
        assert_eq!(json["permissions"], serde_json::json!(["READ", "WRITE"]));
    }
}
