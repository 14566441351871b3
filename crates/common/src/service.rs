//! The resource operations, with access control, preconditions and events
//! wired around the blob store.

use std::sync::Arc;

use blob_store::{BlobRecord, BlobStore, BlobStream};
use bytes::Bytes;
use futures::{stream, Stream, TryStreamExt};

use crate::access::{self, ResourceAccess};
use crate::error::ResourceError;
use crate::events::{EventPublisher, ResourceEventAction, Subscription};
use crate::identity::{Identity, PUBLIC_BUCKET};
use crate::metadata::{ItemMetadata, MetadataOptions, MetadataResolver, ResourceMetadata};
use crate::precondition::{check_precondition, PathLocks, Preconditions};
use crate::publication::{rewrite_application, rewrite_conversation, Document, RewriteMapping};
use crate::resource::{decode_path, ResourceDescriptor, ResourceType};
use crate::upload::{resolve_content_type, SourceError, UploadConfig, UploadPipeline};

const JSON_CONTENT_TYPE: &str = "application/json";

/// A resource being downloaded.
pub struct Download {
    pub metadata: ItemMetadata,
    pub content: BlobStream,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Copy of one resource into the public bucket.
#[derive(Debug, Clone)]
pub struct PublicationRequest {
    pub source: ResourceDescriptor,
    pub target: ResourceDescriptor,
    /// Source attachment URL to target URL; keys may be encoded or decoded
    pub attachments: RewriteMapping,
    pub preserve_reference: bool,
}

#[derive(Debug, Clone)]
pub struct ResourceService {
    blobs: BlobStore,
    pipeline: UploadPipeline,
    metadata: MetadataResolver,
    locks: Arc<PathLocks>,
    events: EventPublisher,
}

impl ResourceService {
    pub fn new(blobs: BlobStore, upload: UploadConfig, events: EventPublisher) -> Self {
        Self {
            pipeline: UploadPipeline::new(blobs.clone(), upload),
            metadata: MetadataResolver::new(blobs.clone()),
            locks: Arc::new(PathLocks::default()),
            blobs,
            events,
        }
    }

    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    /// Fails when the blob store can't be listed.
    pub async fn check_storage(&self) -> Result<(), ResourceError> {
        self.blobs.list("").await?;
        Ok(())
    }

    /// Stream `content` into the item at `descriptor`.
    pub async fn upload<S, E>(
        &self,
        identity: &Identity,
        descriptor: &ResourceDescriptor,
        content: S,
        content_type: Option<&str>,
        preconditions: &Preconditions,
    ) -> Result<ItemMetadata, ResourceError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<SourceError>,
    {
        let name = item_name(descriptor)?;
        self.check_writable(identity, descriptor)?;
        let content_type = resolve_content_type(content_type, name);
        self.write(descriptor, content, content_type, preconditions).await
    }

    /// Store a structured resource. `body` must be a JSON object.
    pub async fn put_document(
        &self,
        identity: &Identity,
        descriptor: &ResourceDescriptor,
        body: Bytes,
        preconditions: &Preconditions,
    ) -> Result<ItemMetadata, ResourceError> {
        item_name(descriptor)?;
        self.check_writable(identity, descriptor)?;
        Document::parse(&body)?;
        self.write(
            descriptor,
            single(body),
            JSON_CONTENT_TYPE.to_string(),
            preconditions,
        )
        .await
    }

    pub async fn download(
        &self,
        identity: &Identity,
        descriptor: &ResourceDescriptor,
    ) -> Result<Download, ResourceError> {
        item_name(descriptor)?;
        access::require(descriptor, identity, ResourceAccess::READ)?;
        match self.blobs.get(&descriptor.storage_key()).await? {
            Some((record, content)) => Ok(Download {
                metadata: ItemMetadata::from_record(descriptor, &record),
                content,
            }),
            None => Err(ResourceError::NotFound(descriptor.url())),
        }
    }

    pub async fn delete(
        &self,
        identity: &Identity,
        descriptor: &ResourceDescriptor,
        preconditions: &Preconditions,
    ) -> Result<(), ResourceError> {
        item_name(descriptor)?;
        self.check_writable(identity, descriptor)?;
        let key = descriptor.storage_key();

        let removed = {
            let _guard = self.locks.lock(&key).await;
            if !preconditions.is_empty() {
                let current = self.blobs.record(&key).await?;
                check_precondition(current.as_ref().map(|r| r.fingerprint.as_str()), preconditions)?;
            }
            self.blobs.remove(&key).await?
        };

        match removed {
            Some(record) => {
                tracing::info!(url = %descriptor, etag = %record.fingerprint, "deleted resource");
                self.events.publish(descriptor, ResourceEventAction::Delete);
                Ok(())
            }
            None => Err(ResourceError::NotFound(descriptor.url())),
        }
    }

    pub async fn metadata(
        &self,
        identity: &Identity,
        descriptor: &ResourceDescriptor,
        options: MetadataOptions,
    ) -> Result<ResourceMetadata, ResourceError> {
        access::require(descriptor, identity, ResourceAccess::READ)?;
        self.metadata.resolve(descriptor, identity, options).await
    }

    /// Watch items and folders; the caller must be able to read each one.
    pub fn subscribe(
        &self,
        identity: &Identity,
        targets: Vec<ResourceDescriptor>,
    ) -> Result<Subscription, ResourceError> {
        for target in &targets {
            access::require(target, identity, ResourceAccess::READ)?;
        }
        Ok(self.events.subscribe(targets))
    }

    /// Copy a resource into the public bucket, rewriting links in
    /// conversations and applications on the way.
    pub async fn publish(
        &self,
        identity: &Identity,
        request: PublicationRequest,
    ) -> Result<ItemMetadata, ResourceError> {
        let PublicationRequest {
            source,
            target,
            attachments,
            preserve_reference,
        } = request;

        item_name(&source)?;
        item_name(&target)?;
        if target.bucket() != PUBLIC_BUCKET {
            return Err(ResourceError::validation(format!(
                "Publication target must be in the public bucket: {}",
                target
            )));
        }
        if source.resource_type() != target.resource_type() {
            return Err(ResourceError::validation(format!(
                "Publication target has a different resource type: {}",
                target
            )));
        }
        access::require(&source, identity, ResourceAccess::READ)?;

        let Some((record, content)) = self.blobs.get(&source.storage_key()).await? else {
            return Err(ResourceError::NotFound(source.url()));
        };
        tracing::info!(source = %source, target = %target, "publishing resource");

        let mapping: RewriteMapping = attachments
            .into_iter()
            .map(|(from, to)| (decode_path(&from), to))
            .collect();
        // only documents with links are read into memory
        let body = match source.resource_type() {
            ResourceType::File | ResourceType::Prompt => {
                return self
                    .write(&target, content, record.content_type, &Preconditions::default())
                    .await;
            }
            ResourceType::Conversation => {
                rewrite_conversation(&read_all(content).await?, &target, &mapping)?
            }
            ResourceType::Application => rewrite_application(
                &read_all(content).await?,
                &target,
                &mapping,
                preserve_reference,
            )?,
        };

        self.write(
            &target,
            single(Bytes::from(body)),
            record.content_type,
            &Preconditions::default(),
        )
        .await
    }

    fn check_writable(
        &self,
        identity: &Identity,
        descriptor: &ResourceDescriptor,
    ) -> Result<(), ResourceError> {
        access::require(descriptor, identity, ResourceAccess::WRITE)?;
        Ok(())
    }

    /// Stage, then under the path lock check the path and preconditions,
    /// commit, and announce.
    async fn write<S, E>(
        &self,
        descriptor: &ResourceDescriptor,
        content: S,
        content_type: String,
        preconditions: &Preconditions,
    ) -> Result<ItemMetadata, ResourceError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<SourceError>,
    {
        let key = descriptor.storage_key();
        let staged = self.pipeline.stage(content).await?;

        let guard = self.locks.lock(&key).await;
        if let Err(e) = self.admit(descriptor, &key, preconditions).await {
            drop(guard);
            staged.discard().await;
            return Err(e);
        }

        let content_length = staged.content_length();
        let fingerprint = staged.fingerprint().to_string();
        let blob_id = staged.persist(&self.blobs).await?;
        let record = BlobRecord::new(blob_id, content_type, content_length, fingerprint);

        let previous = match self.blobs.commit(&key, &record).await {
            Ok(previous) => previous,
            Err(e) => {
                if let Err(cleanup) = self.blobs.discard_blob(&record.blob_id).await {
                    tracing::warn!(blob_id = %record.blob_id, "failed to discard blob: {}", cleanup);
                }
                return Err(e.into());
            }
        };
        drop(guard);

        let action = if previous.is_some() {
            ResourceEventAction::Update
        } else {
            ResourceEventAction::Create
        };
        tracing::info!(
            url = %descriptor,
            etag = %record.fingerprint,
            content_length,
            ?action,
            "stored resource"
        );
        self.events.publish(descriptor, action);

        Ok(ItemMetadata::from_record(descriptor, &record))
    }

    /// Checks a write must pass before its record is committed.
    async fn admit(
        &self,
        descriptor: &ResourceDescriptor,
        key: &str,
        preconditions: &Preconditions,
    ) -> Result<(), ResourceError> {
        self.check_path(descriptor).await?;
        if !preconditions.is_empty() {
            let current = self.blobs.record(key).await?;
            check_precondition(current.as_ref().map(|r| r.fingerprint.as_str()), preconditions)?;
        }
        Ok(())
    }

    /// An item can't sit below another item, nor take the name of a folder.
    async fn check_path(&self, descriptor: &ResourceDescriptor) -> Result<(), ResourceError> {
        let mut ancestors = Vec::new();
        let mut current = descriptor.parent();
        while let Some(folder) = current {
            if folder.is_root() {
                break;
            }
            current = folder.parent();
            ancestors.push(folder);
        }

        // top down, so a lookup never reaches below an existing item
        for folder in ancestors.iter().rev() {
            let key = folder.storage_key();
            if self.blobs.record(key.trim_end_matches('/')).await?.is_some() {
                let url = folder.url();
                return Err(ResourceError::Conflict(format!(
                    "An item already exists at: {}",
                    url.trim_end_matches('/')
                )));
            }
        }

        if self
            .blobs
            .has_children(&format!("{}/", descriptor.storage_key()))
            .await?
        {
            return Err(ResourceError::Conflict(format!(
                "A folder already exists at: {}/",
                descriptor.url()
            )));
        }
        Ok(())
    }
}

fn item_name(descriptor: &ResourceDescriptor) -> Result<&str, ResourceError> {
    match descriptor.name() {
        Some(name) if !descriptor.is_folder() => Ok(name),
        _ => Err(ResourceError::validation("File name is missing")),
    }
}

async fn read_all(content: BlobStream) -> Result<Vec<u8>, ResourceError> {
    let chunks: Vec<Bytes> = content.try_collect().await?;
    Ok(chunks.concat())
}

fn single(body: Bytes) -> impl Stream<Item = Result<Bytes, std::convert::Infallible>> {
    stream::once(async move { Ok(body) })
}
