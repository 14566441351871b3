//! Resource change notifications.
//!
//! Publishing is synchronous and never waits on subscribers: each subscriber
//! owns an unbounded channel. Events for one resource reach a subscriber in
//! the order the mutations committed.

use std::sync::Arc;

use chrono::Utc;
use futures::Stream;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resource::ResourceDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceEventAction {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub url: String,
    pub action: ResourceEventAction,
    /// Milliseconds since the epoch
    pub timestamp: i64,
}

struct Subscriber {
    id: Uuid,
    targets: Vec<ResourceDescriptor>,
    tx: flume::Sender<ResourceEvent>,
}

impl Subscriber {
    fn wants(&self, descriptor: &ResourceDescriptor) -> bool {
        self.targets.iter().any(|target| {
            if target.is_folder() {
                descriptor.is_within(target)
            } else {
                target == descriptor
            }
        })
    }
}

#[derive(Clone, Default)]
pub struct EventPublisher {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch a set of items and folders. A folder covers every descendant.
    pub fn subscribe(&self, targets: Vec<ResourceDescriptor>) -> Subscription {
        let (tx, rx) = flume::unbounded();
        let id = Uuid::new_v4();
        self.subscribers.write().push(Subscriber { id, targets, tx });
        tracing::debug!(subscription = %id, "subscribed to resource events");
        Subscription { id, rx }
    }

    pub fn publish(&self, descriptor: &ResourceDescriptor, action: ResourceEventAction) {
        let event = ResourceEvent {
            url: descriptor.url(),
            action,
            timestamp: Utc::now().timestamp_millis(),
        };

        let mut disconnected = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for subscriber in subscribers.iter().filter(|s| s.wants(descriptor)) {
                if subscriber.tx.send(event.clone()).is_err() {
                    disconnected.push(subscriber.id);
                }
            }
        }

        if !disconnected.is_empty() {
            tracing::warn!(count = disconnected.len(), "dropping disconnected subscribers");
            self.subscribers
                .write()
                .retain(|s| !disconnected.contains(&s.id));
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Receiving end of a subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    rx: flume::Receiver<ResourceEvent>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn recv(&self) -> Option<ResourceEvent> {
        self.rx.recv_async().await.ok()
    }

    pub fn try_recv(&self) -> Option<ResourceEvent> {
        self.rx.try_recv().ok()
    }

    pub fn into_stream(self) -> impl Stream<Item = ResourceEvent> {
        self.rx.into_stream()
    }
}
