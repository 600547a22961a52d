//! Test fixtures.
//!
//! Provides a store seeded with users `u1..uN`, each correlated into a
//! session with its own listener.

use amity_engine::{
    Confirmed, EngineConfig, EngineResult, Listener, MemoryStore, RelationshipEngine, Session,
};
use amity_model::{
    derive_relationship, Asymmetry, AuthIdentity, Email, PeerStatus, RelationshipState, UserKey,
    UserRecord,
};
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::Arc;

/// Names used for seeded users, in key order.
pub const USER_NAMES: [&str; 4] = ["alice", "bob", "carol", "dave"];

/// A seeded store with one session and listener per user.
pub struct TestWorld {
    /// The shared store.
    pub store: Arc<MemoryStore>,
    /// Engine over the store.
    pub engine: RelationshipEngine<Arc<MemoryStore>>,
    listeners: Vec<Listener<Arc<MemoryStore>>>,
}

impl TestWorld {
    /// Seeds `count` users (at most four) with the default configuration.
    pub async fn new(count: usize) -> Self {
        Self::with_config(count, EngineConfig::default()).await
    }

    /// Seeds alice (`u1`) and bob (`u2`).
    pub async fn alice_and_bob() -> Self {
        Self::new(2).await
    }

    /// Seeds `count` users (at most four) with the given configuration.
    pub async fn with_config(count: usize, config: EngineConfig) -> Self {
        assert!(count <= USER_NAMES.len(), "at most {} users", USER_NAMES.len());

        let mut users = Map::new();
        for (i, name) in USER_NAMES.iter().take(count).enumerate() {
            users.insert(
                format!("u{}", i + 1),
                json!({ "uid": name, "email": format!("{name}@example.com") }),
            );
        }
        let store = Arc::new(
            MemoryStore::from_snapshot(json!({ "users": Value::Object(users) }))
                .expect("Failed to seed store"),
        );
        let engine =
            RelationshipEngine::new(config, Arc::clone(&store)).expect("Failed to create engine");

        let mut listeners = Vec::with_capacity(count);
        for i in 0..count {
            let identity = AuthIdentity::new(email(i)).with_uid(USER_NAMES[i]);
            let session = engine
                .correlate(identity)
                .await
                .expect("Failed to correlate seeded user");
            let mut listener = engine.listen(&session).await.expect("Failed to subscribe");
            listener.drain();
            listeners.push(listener);
        }

        Self {
            store,
            engine,
            listeners,
        }
    }

    /// Returns the number of seeded users.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns true if no users were seeded.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns the session of user `i`.
    pub fn session(&self, i: usize) -> &Arc<Session> {
        self.listeners[i].session()
    }

    /// Delivers every pending event to every listener.
    pub fn sync(&mut self) -> usize {
        self.listeners.iter_mut().map(|l| l.drain()).sum()
    }

    /// Resubscribes every listener and replays all records.
    pub async fn resubscribe(&mut self) {
        for listener in &mut self.listeners {
            listener.restart().await.expect("Failed to resubscribe");
            listener.drain();
        }
    }

    /// User `from` sends a request to user `to`.
    pub async fn send(&self, from: usize, to: usize) -> EngineResult<()> {
        self.engine
            .send_request(self.session(from), &key(to), &email(to))
            .await
    }

    /// User `by` accepts the request from user `from`.
    pub async fn accept(&self, by: usize, from: usize) -> EngineResult<()> {
        self.engine.accept(self.session(by), &key(from)).await
    }

    /// User `by` rejects the request from user `from`.
    pub async fn reject(&self, by: usize, from: usize) -> EngineResult<()> {
        self.engine
            .reject(self.session(by), &key(from), Confirmed::by_user())
            .await
    }

    /// User `by` unfriends user `friend`.
    pub async fn unfriend(&self, by: usize, friend: usize) -> EngineResult<()> {
        self.engine
            .unfriend(self.session(by), &key(friend), Confirmed::by_user())
            .await
    }

    /// Derives the stored relationship between users `a` and `b`.
    pub async fn relationship(&self, a: usize, b: usize) -> Result<RelationshipState, Asymmetry> {
        let users = self
            .engine
            .repository()
            .list_users()
            .await
            .expect("Failed to list users");
        let missing = UserRecord::default();
        let a_record = users.get(&key(a)).unwrap_or(&missing);
        let b_record = users.get(&key(b)).unwrap_or(&missing);
        derive_relationship(&key(a), a_record, &key(b), b_record)
    }

    /// Status of user `peer` as projected for user `viewer`.
    pub fn status(&self, viewer: usize, peer: usize) -> PeerStatus {
        self.session(viewer).status_of(&key(peer))
    }
}

/// Record key of seeded user `i`.
pub fn key(i: usize) -> UserKey {
    UserKey::new(format!("u{}", i + 1)).expect("Invalid seeded key")
}

/// Email of seeded user `i`.
pub fn email(i: usize) -> Email {
    Email::parse(format!("{}@example.com", USER_NAMES[i])).expect("Invalid seeded email")
}

/// Runs a future to completion on a fresh current-thread runtime.
///
/// For synchronous test harnesses such as `proptest!`.
pub fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
        .block_on(future)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_world_is_empty_of_relationships() {
        let world = TestWorld::new(3).await;
        assert_eq!(world.len(), 3);
        assert_eq!(world.session(2).user_key(), &key(2));
        assert_eq!(world.session(2).email(), &email(2));
        assert_eq!(world.relationship(0, 1).await.unwrap(), RelationshipState::None);
        assert_eq!(world.session(0).discover().len(), 2);
    }

    #[tokio::test]
    async fn helpers_drive_transitions() {
        let mut world = TestWorld::alice_and_bob().await;
        world.send(0, 1).await.unwrap();
        assert!(world.sync() > 0);
        world.accept(1, 0).await.unwrap();
        world.sync();

        assert_eq!(world.relationship(0, 1).await.unwrap(), RelationshipState::Friends);
        assert_eq!(world.status(0, 1), PeerStatus::Friends);
        assert_eq!(world.status(1, 0), PeerStatus::Friends);
    }

    #[test]
    fn block_on_runs_futures() {
        assert_eq!(block_on(async { 7 }), 7);
    }
}
