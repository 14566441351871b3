/**
 * Access evaluation: what a caller may do with a resource,
 *  from bucket ownership, the public bucket and
 *  per-request key grants.
 */
pub mod access;
pub mod error;
/**
 * Change notifications for subscribed items and folders.
 */
pub mod events;
/**
 * Callers and their buckets.
 *  - Bucket ids derived from original keys
 *  - Per-request keys with attached grants
 */
pub mod identity;
pub mod metadata;
/**
 * If-Match / If-None-Match checks and the per-path
 *  locks every commit holds while checking.
 */
pub mod precondition;
/**
 * Copying conversations and applications into the
 *  public bucket, with their links rewritten.
 */
pub mod publication;
/**
 * Resource URLs: parsing, validation and the
 *  encoded/decoded forms of each path.
 */
pub mod resource;
/**
 * The resource operations themselves. Everything
 *  the HTTP layer does goes through here.
 */
pub mod service;
pub mod upload;
/**
 * Build version information.
 */
pub mod version;

pub mod prelude {
    pub use crate::access::{AccessError, AccessType, ResourceAccess};
    pub use crate::error::ResourceError;
    pub use crate::events::{EventPublisher, ResourceEvent, ResourceEventAction, Subscription};
    pub use crate::identity::{
        AuthError, Authenticator, Bucket, BucketResolver, DelegationStore, Identity, KeyKind,
        ShareGrant, PUBLIC_BUCKET,
    };
    pub use crate::metadata::{
        FolderMetadata, ItemMetadata, MetadataOptions, ResourceMetadata, METADATA_MEDIA_TYPE,
    };
    pub use crate::precondition::{Preconditions, WILDCARD};
    pub use crate::resource::{ResourceDescriptor, ResourceType};
    pub use crate::service::{Download, PublicationRequest, ResourceService};
    pub use crate::upload::UploadConfig;
    pub use crate::version::build_info;
}
