//! Who is calling, and which bucket they own.
//!
//! Callers present either an original key (configured up front) or a
//! per-request key issued from one. Both resolve to the same owner bucket,
//! derived from the original key.

mod bucket;
mod delegation;

use std::collections::HashMap;
use std::sync::Arc;

use crate::access::ResourceAccess;

pub use bucket::{is_valid_bucket_id, Bucket, BucketError, BucketResolver, BUCKET_ID_LEN, PUBLIC_BUCKET};
pub use delegation::{DelegationRecord, DelegationStore, ShareGrant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Original,
    PerRequest,
}

/// A resolved caller.
#[derive(Clone)]
pub struct Identity {
    kind: KeyKind,
    original_key: String,
    project: Option<String>,
    bucket: Bucket,
    delegation: Option<Arc<DelegationRecord>>,
}

impl Identity {
    /// An original-key caller. It carries no grants beyond its own bucket.
    pub fn original(resolver: &BucketResolver, key: &str, project: Option<String>) -> Self {
        Self {
            kind: KeyKind::Original,
            original_key: key.to_string(),
            project,
            bucket: resolver.resolve(key, None),
            delegation: None,
        }
    }

    /// A per-request caller acting for the record's original key.
    pub fn delegated(
        resolver: &BucketResolver,
        record: Arc<DelegationRecord>,
        project: Option<String>,
    ) -> Self {
        let bucket = resolver.resolve(&record.original_key, record.source_deployment.as_deref());
        Self {
            kind: KeyKind::PerRequest,
            original_key: record.original_key.clone(),
            project,
            bucket,
            delegation: Some(record),
        }
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn is_original(&self) -> bool {
        self.kind == KeyKind::Original
    }

    pub fn original_key(&self) -> &str {
        &self.original_key
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    pub fn owner_bucket(&self) -> &str {
        &self.bucket.id
    }

    pub fn app_data_path(&self) -> Option<&str> {
        self.bucket.app_data_path.as_deref()
    }

    pub fn source_deployment(&self) -> Option<&str> {
        self.delegation
            .as_ref()
            .and_then(|record| record.source_deployment.as_deref())
    }

    /// Grant attached to exactly this decoded file URL.
    pub fn file_grant(&self, decoded_url: &str) -> Option<ResourceAccess> {
        let record = self.delegation.as_ref()?;
        record
            .attached_files
            .get(decoded_url)
            .map(|grant| grant.access_types)
    }

    /// Grant of the longest attached folder containing this decoded URL.
    pub fn folder_grant(&self, decoded_url: &str) -> Option<ResourceAccess> {
        let record = self.delegation.as_ref()?;
        record
            .attached_folders
            .iter()
            .filter(|(folder, _)| decoded_url.starts_with(folder.as_str()))
            .max_by_key(|(folder, _)| folder.len())
            .map(|(_, grant)| grant.access_types)
    }
}

// keys stay out of logs
impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("kind", &self.kind)
            .field("bucket", &self.bucket.id)
            .field("project", &self.project)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Api key is missing")]
    MissingKey,
    #[error("Unknown api key")]
    UnknownKey,
}

/// Resolves presented keys to identities.
#[derive(Debug)]
pub struct Authenticator {
    resolver: BucketResolver,
    delegations: Arc<DelegationStore>,
    /// original key -> optional project label
    original_keys: HashMap<String, Option<String>>,
}

impl Authenticator {
    pub fn new(
        resolver: BucketResolver,
        delegations: Arc<DelegationStore>,
        original_keys: impl IntoIterator<Item = (String, Option<String>)>,
    ) -> Self {
        Self {
            resolver,
            delegations,
            original_keys: original_keys.into_iter().collect(),
        }
    }

    pub fn resolver(&self) -> &BucketResolver {
        &self.resolver
    }

    pub fn delegations(&self) -> &Arc<DelegationStore> {
        &self.delegations
    }

    /// Delegation store first, then the original-key registry.
    pub fn authenticate(&self, key: &str) -> Result<Identity, AuthError> {
        if key.is_empty() {
            return Err(AuthError::MissingKey);
        }
        if let Some(record) = self.delegations.get(key) {
            let project = self.original_keys.get(&record.original_key).cloned().flatten();
            return Ok(Identity::delegated(&self.resolver, record, project));
        }
        if let Some(project) = self.original_keys.get(key) {
            return Ok(Identity::original(&self.resolver, key, project.clone()));
        }
        Err(AuthError::UnknownKey)
    }
}
