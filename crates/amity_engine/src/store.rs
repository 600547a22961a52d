//! Store client abstraction.

use crate::error::StoreResult;
use amity_model::{ChangeEvent, StorePath};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A store client talks to the shared tree store.
///
/// This trait abstracts the remote store, allowing for different
/// implementations (a hosted realtime database, the in-memory
/// [`MemoryStore`](crate::MemoryStore) for tests, etc.).
///
/// No request spans more than one path atomically except `patch`, whose
/// entries are applied together under a single parent.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Reads the value at a path.
    async fn read(&self, path: &StorePath) -> StoreResult<Option<Value>>;

    /// Replaces the value at a path. `Null` deletes it.
    async fn write(&self, path: &StorePath, value: Value) -> StoreResult<()>;

    /// Merges entries into the mapping at a path.
    ///
    /// A `Null` entry deletes that key. Sibling keys are untouched.
    async fn patch(&self, path: &StorePath, entries: Map<String, Value>) -> StoreResult<()>;

    /// Creates a new child of a collection and returns its store-assigned key.
    async fn push(&self, collection: &StorePath, value: Value) -> StoreResult<String>;

    /// Subscribes to child events of a collection.
    ///
    /// The subscription first yields an added event for every existing
    /// child, then one event per later mutation of a child.
    async fn subscribe(&self, collection: &StorePath) -> StoreResult<Subscription>;
}

#[async_trait]
impl<S: StoreClient + ?Sized> StoreClient for Arc<S> {
    async fn read(&self, path: &StorePath) -> StoreResult<Option<Value>> {
        (**self).read(path).await
    }

    async fn write(&self, path: &StorePath, value: Value) -> StoreResult<()> {
        (**self).write(path, value).await
    }

    async fn patch(&self, path: &StorePath, entries: Map<String, Value>) -> StoreResult<()> {
        (**self).patch(path, entries).await
    }

    async fn push(&self, collection: &StorePath, value: Value) -> StoreResult<String> {
        (**self).push(collection, value).await
    }

    async fn subscribe(&self, collection: &StorePath) -> StoreResult<Subscription> {
        (**self).subscribe(collection).await
    }
}

/// An unbounded feed of change events for one collection.
///
/// Dropping the subscription unregisters it from the store.
#[derive(Debug)]
pub struct Subscription {
    collection: StorePath,
    receiver: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl Subscription {
    /// Creates a subscription from the receiving half of an event channel.
    pub fn new(collection: StorePath, receiver: mpsc::UnboundedReceiver<ChangeEvent>) -> Self {
        Self {
            collection,
            receiver,
        }
    }

    /// Returns the subscribed collection.
    pub fn collection(&self) -> &StorePath {
        &self.collection
    }

    /// Waits for the next event. Returns `None` once the store closed the feed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }

    /// Returns an already delivered event without waiting.
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        self.receiver.try_recv().ok()
    }
}
