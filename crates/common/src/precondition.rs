//! Fingerprint preconditions on update and delete.
//!
//! The check itself is [`check_precondition`]. [`PathLocks`] provides the
//! narrow per-path critical section every commit and delete holds while it
//! re-reads the stored record, checks it, and swaps it. Staging the content
//! happens before the lock is taken.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

pub const WILDCARD: &str = "*";

/// Conditional headers supplied with a mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preconditions {
    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
}

impl Preconditions {
    pub fn if_match(value: impl Into<String>) -> Self {
        Self {
            if_match: Some(value.into()),
            if_none_match: None,
        }
    }

    pub fn if_none_match(value: impl Into<String>) -> Self {
        Self {
            if_match: None,
            if_none_match: Some(value.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.if_match.is_none() && self.if_none_match.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("ETag {etag} is rejected")]
pub struct PreconditionError {
    pub etag: String,
}

impl PreconditionError {
    fn rejected(etag: &str) -> Self {
        Self {
            etag: etag.to_string(),
        }
    }
}

/// Check the supplied conditions against the stored fingerprint.
///
/// - `If-Match: *` passes whether or not the resource exists
/// - any other `If-Match` fails on a missing resource and otherwise must equal
///   the stored fingerprint exactly
/// - `If-None-Match: *` fails if the resource exists; any other value fails
///   when it equals the stored fingerprint
pub fn check_precondition(
    current: Option<&str>,
    preconditions: &Preconditions,
) -> Result<(), PreconditionError> {
    if let Some(expected) = preconditions.if_match.as_deref() {
        if expected != WILDCARD && current != Some(expected) {
            return Err(PreconditionError::rejected(expected));
        }
    }
    if let Some(unexpected) = preconditions.if_none_match.as_deref() {
        let clash = match current {
            Some(current) => unexpected == WILDCARD || unexpected == current,
            None => false,
        };
        if clash {
            return Err(PreconditionError::rejected(unexpected));
        }
    }
    Ok(())
}

/// Async locks keyed by resource path.
///
/// An entry exists only while someone holds or waits on it. Operations on
/// different paths never wait on each other.
#[derive(Debug, Default)]
pub struct PathLocks {
    paths: parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PathLocks {
    pub async fn lock(&self, path: &str) -> PathGuard<'_> {
        let lock = self.paths.lock().entry(path.to_string()).or_default().clone();
        let guard = lock.lock_owned().await;
        PathGuard {
            locks: self,
            path: path.to_string(),
            guard: Some(guard),
        }
    }

    fn release(&self, path: &str) {
        let mut paths = self.paths.lock();
        if paths.get(path).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            paths.remove(path);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.paths.lock().len()
    }
}

/// Exclusive hold on one path, released on drop.
pub struct PathGuard<'a> {
    locks: &'a PathLocks,
    path: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(&self.path);
    }
}

impl std::fmt::Debug for PathGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathGuard").field("path", &self.path).finish()
    }
}
