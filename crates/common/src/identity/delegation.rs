use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::ResourceAccess;
use crate::resource::ResourceDescriptor;

/// Access attached to one file or folder URL for a delegated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareGrant {
    pub access_types: ResourceAccess,
}

/// What a per-request key was issued with. Immutable once issued.
#[derive(Debug)]
pub struct DelegationRecord {
    pub original_key: String,
    pub per_request_key: String,
    pub source_deployment: Option<String>,
    /// Keyed by decoded file URL
    pub attached_files: HashMap<String, ShareGrant>,
    /// Keyed by decoded folder URL, always ending in `/`
    pub attached_folders: HashMap<String, ShareGrant>,
    pub expires_at: Instant,
}

impl DelegationRecord {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Registry of live per-request keys.
///
/// Records are inserted once at issuance and only ever read afterwards, until
/// they expire. Expired records are invisible to [`get`](Self::get) right away
/// and physically removed by [`sweep_expired`](Self::sweep_expired).
#[derive(Debug)]
pub struct DelegationStore {
    records: RwLock<HashMap<String, Arc<DelegationRecord>>>,
    ttl: Duration,
}

impl DelegationStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a fresh per-request key on behalf of `original_key`.
    pub fn issue(
        &self,
        original_key: &str,
        source_deployment: Option<String>,
        attached_files: impl IntoIterator<Item = (ResourceDescriptor, ResourceAccess)>,
        attached_folders: impl IntoIterator<Item = (ResourceDescriptor, ResourceAccess)>,
    ) -> Arc<DelegationRecord> {
        let grant = |(descriptor, access_types): (ResourceDescriptor, ResourceAccess)| {
            (descriptor.decoded_url(), ShareGrant { access_types })
        };
        let attached_folders = attached_folders
            .into_iter()
            .map(grant)
            .map(|(url, grant)| {
                if url.ends_with('/') {
                    (url, grant)
                } else {
                    (format!("{}/", url), grant)
                }
            })
            .collect();

        let record = Arc::new(DelegationRecord {
            original_key: original_key.to_string(),
            per_request_key: Uuid::new_v4().to_string(),
            source_deployment,
            attached_files: attached_files.into_iter().map(grant).collect(),
            attached_folders,
            expires_at: Instant::now() + self.ttl,
        });

        self.records
            .write()
            .insert(record.per_request_key.clone(), record.clone());
        tracing::debug!(
            files = record.attached_files.len(),
            folders = record.attached_folders.len(),
            "issued per-request key"
        );
        record
    }

    /// Look up a live record; expired keys are treated as unknown.
    pub fn get(&self, per_request_key: &str) -> Option<Arc<DelegationRecord>> {
        let record = self.records.read().get(per_request_key).cloned()?;
        if record.is_expired(Instant::now()) {
            None
        } else {
            Some(record)
        }
    }

    pub fn revoke(&self, per_request_key: &str) -> bool {
        self.records.write().remove(per_request_key).is_some()
    }

    /// Drop every expired record, returning how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        before - records.len()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUCKET: &str = "15sfbZm-qqWlR3N2YNGjAcQUCgCN5LbcfNxsLXb33vM";

    #[test]
    fn test_issue_and_get() {
        let store = DelegationStore::new(Duration::from_secs(60));
        let file = ResourceDescriptor::parse(&format!("files/{}/a%20b.txt", BUCKET)).unwrap();
        let folder = ResourceDescriptor::parse(&format!("files/{}/docs/", BUCKET)).unwrap();

        let record = store.issue(
            "proxyKey1",
            Some("app".to_string()),
            [(file, ResourceAccess::READ)],
            [(folder, ResourceAccess::ALL)],
        );

        let found = store.get(&record.per_request_key).unwrap();
        assert!(Arc::ptr_eq(&found, &record));
        assert_eq!(found.original_key, "proxyKey1");
        assert_eq!(
            found.attached_files.get(&format!("files/{}/a b.txt", BUCKET)),
            Some(&ShareGrant {
                access_types: ResourceAccess::READ
            })
        );
        assert!(found
            .attached_folders
            .contains_key(&format!("files/{}/docs/", BUCKET)));
        assert!(store.get("unknown").is_none());
    }

    #[test]
    fn test_keys_are_unique() {
        let store = DelegationStore::new(Duration::from_secs(60));
        let a = store.issue("proxyKey1", None, [], []);
        let b = store.issue("proxyKey1", None, [], []);
        assert_ne!(a.per_request_key, b.per_request_key);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_expired_keys_are_unknown_and_swept() {
        let store = DelegationStore::new(Duration::ZERO);
        let record = store.issue("proxyKey1", None, [], []);

        assert!(store.get(&record.per_request_key).is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(store.sweep_expired(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_revoke() {
        let store = DelegationStore::new(Duration::from_secs(60));
        let record = store.issue("proxyKey1", None, [], []);
        assert!(store.revoke(&record.per_request_key));
        assert!(!store.revoke(&record.per_request_key));
        assert!(store.get(&record.per_request_key).is_none());
    }
}
