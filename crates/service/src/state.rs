use std::sync::Arc;

use blob_store::{BlobStore, BlobStoreError};
use common::identity::BucketError;
use common::prelude::{Authenticator, BucketResolver, DelegationStore, EventPublisher, ResourceService};

use super::config::Config;

/// Main service state, shared by every handler
#[derive(Clone)]
pub struct State {
    resources: ResourceService,
    auth: Arc<Authenticator>,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        // 1. Setup blob store
        tracing::debug!(backend = ?config.blob_store, "ServiceState::from_config - opening blob store");
        let blobs = BlobStore::new(config.blob_store.clone()).await?;

        // 2. Setup identity resolution
        let resolver = BucketResolver::new(&config.bucket_secret)?;
        let delegations = Arc::new(DelegationStore::new(config.delegation_ttl));
        let keys = config
            .keys
            .iter()
            .map(|k| (k.key.clone(), k.project.clone()));
        let auth = Authenticator::new(resolver, delegations, keys);
        tracing::info!(keys = config.keys.len(), "loaded original keys");

        Ok(Self::new(ResourceService::new(blobs, config.upload, EventPublisher::new()), auth))
    }

    pub fn new(resources: ResourceService, auth: Authenticator) -> Self {
        Self {
            resources,
            auth: Arc::new(auth),
        }
    }

    pub fn resources(&self) -> &ResourceService {
        &self.resources
    }

    pub fn auth(&self) -> &Authenticator {
        &self.auth
    }

    pub fn delegations(&self) -> &Arc<DelegationStore> {
        self.auth.delegations()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("Blob store error: {0}")]
    BlobStore(#[from] BlobStoreError),
    #[error("Invalid bucket secret: {0}")]
    BucketSecret(#[from] BucketError),
}
