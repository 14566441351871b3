//! Effective permissions on a resource.
//!
//! [`evaluate`] turns bucket ownership plus a caller's delegated grants into a
//! [`ResourceAccess`] set, in this order:
//!
//! 1. own bucket, or own app-data path: everything
//! 2. the public bucket: read
//! 3. an exact file grant for the decoded URL
//! 4. the longest folder grant whose prefix covers the decoded URL
//! 5. otherwise denied

use std::fmt;

use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::identity::{Identity, PUBLIC_BUCKET};
use crate::resource::ResourceDescriptor;

/// One kind of access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessType {
    Read,
    Write,
}

impl AccessType {
    const ALL: [AccessType; 2] = [AccessType::Read, AccessType::Write];

    const fn bit(self) -> u8 {
        match self {
            AccessType::Read => 0b01,
            AccessType::Write => 0b10,
        }
    }
}

/// A set of [`AccessType`]s, stored as a bit set.
///
/// Serializes as a JSON array, e.g. `["READ","WRITE"]`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceAccess(u8);

impl ResourceAccess {
    pub const NONE: ResourceAccess = ResourceAccess(0);
    pub const READ: ResourceAccess = ResourceAccess(AccessType::Read.bit());
    pub const WRITE: ResourceAccess = ResourceAccess(AccessType::Write.bit());
    pub const ALL: ResourceAccess = ResourceAccess(AccessType::Read.bit() | AccessType::Write.bit());

    pub fn contains(self, other: ResourceAccess) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn has(self, access_type: AccessType) -> bool {
        self.0 & access_type.bit() != 0
    }

    pub fn union(self, other: ResourceAccess) -> ResourceAccess {
        ResourceAccess(self.0 | other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = AccessType> {
        AccessType::ALL.into_iter().filter(move |t| self.has(*t))
    }
}

impl From<AccessType> for ResourceAccess {
    fn from(access_type: AccessType) -> Self {
        ResourceAccess(access_type.bit())
    }
}

impl FromIterator<AccessType> for ResourceAccess {
    fn from_iter<I: IntoIterator<Item = AccessType>>(iter: I) -> Self {
        iter.into_iter()
            .fold(ResourceAccess::NONE, |set, t| set.union(t.into()))
    }
}

impl fmt::Debug for ResourceAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serialize for ResourceAccess {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(None)?;
        for access_type in self.iter() {
            seq.serialize_element(&access_type)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for ResourceAccess {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AccessVisitor;

        impl<'de> Visitor<'de> for AccessVisitor {
            type Value = ResourceAccess;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a list of access types")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut set = ResourceAccess::NONE;
                while let Some(access_type) = seq.next_element::<AccessType>()? {
                    set = set.union(access_type.into());
                }
                Ok(set)
            }
        }

        deserializer.deserialize_seq(AccessVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("You don't have an access to: {url}")]
pub struct AccessError {
    pub url: String,
}

impl AccessError {
    pub fn new(descriptor: &ResourceDescriptor) -> Self {
        Self {
            url: descriptor.url(),
        }
    }
}

/// Compute what `identity` may do with `descriptor`.
pub fn evaluate(
    descriptor: &ResourceDescriptor,
    identity: &Identity,
) -> Result<ResourceAccess, AccessError> {
    if descriptor.bucket() == identity.owner_bucket() {
        return Ok(ResourceAccess::ALL);
    }
    if let Some(app_data) = identity.app_data_path() {
        let path = descriptor.bucket_path();
        if path.strip_prefix(app_data).is_some_and(|rest| rest.is_empty() || rest.starts_with('/')) {
            return Ok(ResourceAccess::ALL);
        }
    }
    if descriptor.bucket() == PUBLIC_BUCKET {
        return Ok(ResourceAccess::READ);
    }

    let url = descriptor.decoded_url();
    if let Some(access) = identity.file_grant(&url) {
        tracing::debug!(url = %url, ?access, "access from file grant");
        return Ok(access);
    }
    if let Some(access) = identity.folder_grant(&url) {
        tracing::debug!(url = %url, ?access, "access from folder grant");
        return Ok(access);
    }

    tracing::debug!(url = %url, "access denied");
    Err(AccessError::new(descriptor))
}

/// Like [`evaluate`], but also denies when the effective set lacks `needed`.
pub fn require(
    descriptor: &ResourceDescriptor,
    identity: &Identity,
    needed: ResourceAccess,
) -> Result<ResourceAccess, AccessError> {
    let access = evaluate(descriptor, identity)?;
    if access.contains(needed) {
        Ok(access)
    } else {
        Err(AccessError::new(descriptor))
    }
}
