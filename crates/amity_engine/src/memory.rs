//! In-memory reference implementation of the store contract.

use crate::error::{StoreError, StoreResult};
use crate::store::{StoreClient, Subscription};
use amity_model::{ChangeEvent, StorePath};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// An in-memory tree store.
///
/// The store keeps a single JSON tree and follows the semantics of hosted
/// realtime databases: writing `null` deletes, empty mappings are not
/// stored, and every mutation is fanned out to the subscribers of each
/// affected collection as one event per changed child.
///
/// It also supports a connectivity switch and per-path failure injection so
/// that partial-write windows can be reproduced in tests.
///
/// # Example
///
/// ```
/// use amity_engine::{MemoryStore, StoreClient};
/// use amity_model::StorePath;
/// use serde_json::json;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let store = MemoryStore::new();
/// let path = StorePath::parse("users/u1/email").unwrap();
/// store.write(&path, json!("alice@x.com")).await.unwrap();
/// assert_eq!(store.read(&path).await.unwrap(), Some(json!("alice@x.com")));
/// # });
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    connected: AtomicBool,
    failing: Mutex<Vec<StorePath>>,
}

#[derive(Debug)]
struct Inner {
    root: Map<String, Value>,
    /// Number of mutations applied so far.
    sequence: u64,
    subscribers: Vec<Subscriber>,
}

#[derive(Debug)]
struct Subscriber {
    collection: StorePath,
    sender: mpsc::UnboundedSender<ChangeEvent>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::with_root(Map::new())
    }

    fn with_root(root: Map<String, Value>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                root,
                sequence: 0,
                subscribers: Vec::new(),
            }),
            connected: AtomicBool::new(true),
            failing: Mutex::new(Vec::new()),
        }
    }

    /// Creates a store from a snapshot previously taken with [`snapshot`](Self::snapshot).
    pub fn from_snapshot(snapshot: Value) -> StoreResult<Self> {
        match normalize(snapshot) {
            None => Ok(Self::new()),
            Some(Value::Object(root)) => Ok(Self::with_root(root)),
            Some(_) => Err(StoreError::InvalidValue {
                path: "/".into(),
                message: "snapshot root must be an object".into(),
            }),
        }
    }

    /// Returns the whole tree.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.inner.lock().root.clone())
    }

    /// Returns the number of mutations applied so far.
    pub fn sequence(&self) -> u64 {
        self.inner.lock().sequence
    }

    /// Returns the number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .subscribers
            .iter()
            .filter(|s| !s.sender.is_closed())
            .count()
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Returns true if the store accepts requests.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Makes every mutation at or below `prefix` fail until cleared.
    pub fn fail_writes_under(&self, prefix: StorePath) {
        self.failing.lock().push(prefix);
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        self.failing.lock().clear();
    }

    /// Ends every subscription feed.
    pub fn close_subscriptions(&self) {
        self.inner.lock().subscribers.clear();
    }

    fn check_connected(&self) -> StoreResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(StoreError::NotConnected)
        }
    }

    fn check_writable(&self, path: &StorePath) -> StoreResult<()> {
        self.check_connected()?;
        if self
            .failing
            .lock()
            .iter()
            .any(|prefix| path.starts_with(prefix))
        {
            return Err(StoreError::unavailable(path, "injected failure"));
        }
        Ok(())
    }

    /// Applies a mutation rooted at `path` and notifies subscribers.
    fn mutate(
        &self,
        path: &StorePath,
        apply: impl FnOnce(&mut Map<String, Value>) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock();

        let collections: BTreeSet<StorePath> = inner
            .subscribers
            .iter()
            .map(|s| &s.collection)
            .filter(|c| path.starts_with(c) || c.starts_with(path))
            .cloned()
            .collect();
        let before: Vec<BTreeMap<String, Value>> = collections
            .iter()
            .map(|c| capture(&inner.root, c, path))
            .collect();

        apply(&mut inner.root)?;

        inner.sequence += 1;
        let sequence = inner.sequence;

        let mut events = Vec::new();
        for (collection, before) in collections.iter().zip(before) {
            let after = capture(&inner.root, collection, path);
            for event in diff(sequence, &before, &after) {
                events.push((collection, event));
            }
        }

        inner.subscribers.retain(|s| !s.sender.is_closed());
        for (collection, event) in events {
            debug!(
                collection = %collection,
                key = %event.key,
                sequence = event.sequence,
                change = ?event.change_type,
                "fan out change"
            );
            for subscriber in inner.subscribers.iter().filter(|s| &s.collection == collection) {
                // A receiver dropped since the retain above is pruned on the next mutation
                let _ = subscriber.sender.send(event.clone());
            }
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn read(&self, path: &StorePath) -> StoreResult<Option<Value>> {
        self.check_connected()?;
        let inner = self.inner.lock();
        Ok(lookup_value(&inner.root, path))
    }

    async fn write(&self, path: &StorePath, value: Value) -> StoreResult<()> {
        self.check_writable(path)?;
        self.mutate(path, |root| set_value(root, path, value))
    }

    async fn patch(&self, path: &StorePath, entries: Map<String, Value>) -> StoreResult<()> {
        self.check_writable(path)?;
        let children = entries
            .into_iter()
            .map(|(key, value)| -> StoreResult<(StorePath, Value)> {
                Ok((path.child(&key)?, value))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        self.mutate(path, |root| {
            for (child, value) in children {
                set_value(root, &child, value)?;
            }
            Ok(())
        })
    }

    async fn push(&self, collection: &StorePath, value: Value) -> StoreResult<String> {
        self.check_writable(collection)?;
        let key = Uuid::new_v4().simple().to_string();
        let path = collection.child(&key)?;
        self.mutate(&path, |root| set_value(root, &path, value))?;
        Ok(key)
    }

    async fn subscribe(&self, collection: &StorePath) -> StoreResult<Subscription> {
        self.check_connected()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        let sequence = inner.sequence;
        if let Some(children) = lookup_map(&inner.root, collection) {
            for (key, value) in children {
                // The receiver is still in scope, so this cannot fail
                let _ = sender.send(ChangeEvent::added(sequence, key.clone(), value.clone()));
            }
        }
        inner.subscribers.push(Subscriber {
            collection: collection.clone(),
            sender,
        });
        Ok(Subscription::new(collection.clone(), receiver))
    }
}

/// Drops nulls and empty mappings, recursively.
fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| normalize(v).map(|v| (k, v)))
                .collect();
            if map.is_empty() {
                None
            } else {
                Some(Value::Object(map))
            }
        }
        other => Some(other),
    }
}

fn lookup_map<'a>(root: &'a Map<String, Value>, path: &StorePath) -> Option<&'a Map<String, Value>> {
    let mut current = root;
    for segment in path.segments() {
        current = current.get(segment)?.as_object()?;
    }
    Some(current)
}

fn lookup_value(root: &Map<String, Value>, path: &StorePath) -> Option<Value> {
    match path.parent() {
        None if root.is_empty() => None,
        None => Some(Value::Object(root.clone())),
        Some(parent) => {
            let last = path.last()?;
            lookup_map(root, &parent)?.get(last).cloned()
        }
    }
}

fn set_value(root: &mut Map<String, Value>, path: &StorePath, value: Value) -> StoreResult<()> {
    match (path.is_root(), normalize(value)) {
        (true, None) => root.clear(),
        (true, Some(Value::Object(map))) => *root = map,
        (true, Some(_)) => {
            return Err(StoreError::InvalidValue {
                path: "/".into(),
                message: "root must be an object".into(),
            })
        }
        (false, None) => remove_at(root, path.segments()),
        (false, Some(value)) => set_at(root, path.segments(), value),
    }
    Ok(())
}

fn set_at(map: &mut Map<String, Value>, segments: &[String], value: Value) {
    match segments {
        [] => {}
        [last] => {
            map.insert(last.clone(), value);
        }
        [first, rest @ ..] => {
            let entry = map
                .entry(first.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                set_at(child, rest, value);
            }
        }
    }
}

/// Removes the value at `segments` and prunes mappings left empty.
fn remove_at(map: &mut Map<String, Value>, segments: &[String]) {
    match segments {
        [] => {}
        [last] => {
            map.remove(last);
        }
        [first, rest @ ..] => {
            let emptied = match map.get_mut(first) {
                Some(Value::Object(child)) => {
                    remove_at(child, rest);
                    child.is_empty()
                }
                _ => false,
            };
            if emptied {
                map.remove(first);
            }
        }
    }
}

/// Children of `collection` that a mutation at `path` may touch.
fn capture(
    root: &Map<String, Value>,
    collection: &StorePath,
    path: &StorePath,
) -> BTreeMap<String, Value> {
    let Some(children) = lookup_map(root, collection) else {
        return BTreeMap::new();
    };
    if path.len() > collection.len() {
        let key = &path.segments()[collection.len()];
        children
            .get(key)
            .map(|value| BTreeMap::from([(key.clone(), value.clone())]))
            .unwrap_or_default()
    } else {
        children
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

fn diff(
    sequence: u64,
    before: &BTreeMap<String, Value>,
    after: &BTreeMap<String, Value>,
) -> Vec<ChangeEvent> {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    keys.into_iter()
        .filter_map(|key| match (before.get(key), after.get(key)) {
            (None, Some(value)) => Some(ChangeEvent::added(sequence, key.clone(), value.clone())),
            (Some(old), Some(new)) if old != new => {
                Some(ChangeEvent::changed(sequence, key.clone(), new.clone()))
            }
            (Some(_), None) => Some(ChangeEvent::removed(sequence, key.clone())),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use amity_model::ChangeType;
    use serde_json::json;

    fn path(p: &str) -> StorePath {
        StorePath::parse(p).unwrap()
    }

    fn entries(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[tokio::test]
    async fn write_and_read() {
        let store = MemoryStore::new();
        store
            .write(&path("users/u1"), json!({ "email": "alice@x.com" }))
            .await
            .unwrap();

        assert_eq!(
            store.read(&path("users/u1/email")).await.unwrap(),
            Some(json!("alice@x.com"))
        );
        assert_eq!(store.read(&path("users/u2")).await.unwrap(), None);
        assert_eq!(store.sequence(), 1);
    }

    #[tokio::test]
    async fn patch_preserves_siblings_and_deletes_nulls() {
        let store = MemoryStore::new();
        let friends = path("users/u1/friends");
        store
            .patch(
                &friends,
                entries(json!({ "u2": { "email": "bob@x.com" }, "u3": { "email": "cy@x.com" } })),
            )
            .await
            .unwrap();
        store
            .patch(&friends, entries(json!({ "u2": null })))
            .await
            .unwrap();

        assert_eq!(
            store.read(&friends).await.unwrap(),
            Some(json!({ "u3": { "email": "cy@x.com" } }))
        );
    }

    #[tokio::test]
    async fn deleting_last_entry_prunes_empty_mappings() {
        let store = MemoryStore::new();
        store
            .write(&path("users/u1"), json!({ "email": "a@x.com", "friends": { "u2": { "email": "b@x.com" } } }))
            .await
            .unwrap();
        store
            .patch(&path("users/u1/friends"), entries(json!({ "u2": null })))
            .await
            .unwrap();

        assert_eq!(store.read(&path("users/u1/friends")).await.unwrap(), None);
        assert_eq!(
            store.read(&path("users/u1")).await.unwrap(),
            Some(json!({ "email": "a@x.com" }))
        );
    }

    #[tokio::test]
    async fn empty_mappings_are_not_stored() {
        let store = MemoryStore::new();
        store
            .write(&path("users/u1"), json!({ "email": "a@x.com", "friends": {} }))
            .await
            .unwrap();
        assert_eq!(
            store.read(&path("users/u1")).await.unwrap(),
            Some(json!({ "email": "a@x.com" }))
        );
    }

    #[tokio::test]
    async fn subscribe_replays_existing_children() {
        let store = MemoryStore::new();
        store.write(&path("users/u1/email"), json!("a@x.com")).await.unwrap();
        store.write(&path("users/u2/email"), json!("b@x.com")).await.unwrap();

        let mut subscription = store.subscribe(&path("users")).await.unwrap();
        let first = subscription.try_next().unwrap();
        let second = subscription.try_next().unwrap();
        assert_eq!(first.change_type, ChangeType::Added);
        assert_eq!(first.key, "u1");
        assert_eq!(second.key, "u2");
        assert!(subscription.try_next().is_none());
    }

    #[tokio::test]
    async fn mutations_emit_one_event_per_child() {
        let store = MemoryStore::new();
        store.write(&path("users/u1/email"), json!("a@x.com")).await.unwrap();
        let mut subscription = store.subscribe(&path("users")).await.unwrap();
        subscription.try_next().unwrap();

        store
            .patch(&path("users/u1/friends"), entries(json!({ "u2": { "email": "b@x.com" } })))
            .await
            .unwrap();
        let event = subscription.try_next().unwrap();
        assert_eq!(event.change_type, ChangeType::Changed);
        assert_eq!(event.value["friends"]["u2"]["email"], json!("b@x.com"));

        store.write(&path("users/u2/email"), json!("b@x.com")).await.unwrap();
        let event = subscription.try_next().unwrap();
        assert_eq!(event.change_type, ChangeType::Added);
        assert_eq!(event.key, "u2");

        store.write(&path("users/u2"), Value::Null).await.unwrap();
        let event = subscription.try_next().unwrap();
        assert_eq!(event.change_type, ChangeType::Removed);
        assert!(subscription.try_next().is_none());
    }

    #[tokio::test]
    async fn no_op_patch_emits_nothing() {
        let store = MemoryStore::new();
        store.write(&path("users/u1/email"), json!("a@x.com")).await.unwrap();
        let mut subscription = store.subscribe(&path("users")).await.unwrap();
        subscription.try_next().unwrap();

        store
            .patch(&path("users/u1/requestsReceived"), entries(json!({ "u9": null })))
            .await
            .unwrap();
        assert!(subscription.try_next().is_none());
    }

    #[tokio::test]
    async fn writes_outside_collection_are_not_delivered() {
        let store = MemoryStore::new();
        let mut subscription = store.subscribe(&path("users")).await.unwrap();
        store
            .write(&path("emailIndex/a@x,com"), json!("u1"))
            .await
            .unwrap();
        assert!(subscription.try_next().is_none());
    }

    #[tokio::test]
    async fn push_assigns_keys() {
        let store = MemoryStore::new();
        let mut subscription = store.subscribe(&path("users")).await.unwrap();
        let key = store
            .push(&path("users"), json!({ "email": "a@x.com" }))
            .await
            .unwrap();

        assert!(StorePath::parse("users").unwrap().child(&key).is_ok());
        let event = subscription.try_next().unwrap();
        assert_eq!(event.key, key);
        assert_eq!(event.change_type, ChangeType::Added);
    }

    #[tokio::test]
    async fn injected_failures() {
        let store = MemoryStore::new();
        store.fail_writes_under(path("users/u2"));

        store.write(&path("users/u1/email"), json!("a@x.com")).await.unwrap();
        let err = store
            .write(&path("users/u2/email"), json!("b@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));
        assert_eq!(store.sequence(), 1);

        store.clear_failures();
        store.write(&path("users/u2/email"), json!("b@x.com")).await.unwrap();
    }

    #[tokio::test]
    async fn disconnected_store_rejects_everything() {
        let store = MemoryStore::new();
        store.set_connected(false);
        assert!(matches!(
            store.read(&path("users")).await,
            Err(StoreError::NotConnected)
        ));
        assert!(store.subscribe(&path("users")).await.is_err());
        assert!(store.write(&path("users/u1"), json!(1)).await.is_err());
    }

    #[tokio::test]
    async fn snapshot_round_trip() {
        let store = MemoryStore::from_snapshot(json!({ "users": { "u1": { "email": "a@x.com" } } }))
            .unwrap();
        let restored = MemoryStore::from_snapshot(store.snapshot()).unwrap();
        assert_eq!(
            restored.read(&path("users/u1/email")).await.unwrap(),
            Some(json!("a@x.com"))
        );
        assert!(MemoryStore::from_snapshot(json!([1, 2])).is_err());
        assert_eq!(MemoryStore::from_snapshot(Value::Null).unwrap().snapshot(), json!({}));
    }

    #[tokio::test]
    async fn closing_and_dropping_subscriptions() {
        let store = MemoryStore::new();
        let dropped = store.subscribe(&path("users")).await.unwrap();
        let mut kept = store.subscribe(&path("users")).await.unwrap();
        assert_eq!(store.subscriber_count(), 2);

        drop(dropped);
        assert_eq!(store.subscriber_count(), 1);

        store.close_subscriptions();
        assert!(kept.next().await.is_none());
    }
}
