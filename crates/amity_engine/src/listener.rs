//! Folds store change events into a session projection.

use crate::engine::EngineStats;
use crate::error::{EngineError, EngineResult};
use crate::repository::Repository;
use crate::session::Session;
use crate::store::{StoreClient, Subscription};
use amity_model::{ChangeEvent, UserEvent};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Keeps a session's projection current from a users-collection subscription.
///
/// Events that do not decode as user records are logged and skipped.
pub struct Listener<S: StoreClient> {
    repository: Arc<Repository<S>>,
    session: Arc<Session>,
    subscription: Subscription,
    stats: Arc<RwLock<EngineStats>>,
}

impl<S: StoreClient> Listener<S> {
    pub(crate) fn new(
        repository: Arc<Repository<S>>,
        session: Arc<Session>,
        subscription: Subscription,
        stats: Arc<RwLock<EngineStats>>,
    ) -> Self {
        Self {
            repository,
            session,
            subscription,
            stats,
        }
    }

    /// Returns the session this listener updates.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Waits for the next user event and applies it.
    ///
    /// Fails with [`EngineError::SubscriptionClosed`] once the store closed
    /// the feed.
    pub async fn next(&mut self) -> EngineResult<UserEvent> {
        loop {
            let event = self
                .subscription
                .next()
                .await
                .ok_or(EngineError::SubscriptionClosed)?;
            if let Some(event) = self.fold(event) {
                return Ok(event);
            }
        }
    }

    /// Applies every event already delivered and returns how many were applied.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.subscription.try_next() {
            if self.fold(event).is_some() {
                applied += 1;
            }
        }
        applied
    }

    /// Applies events until the store closes the feed.
    pub async fn run(&mut self) -> usize {
        let mut applied = 0;
        while self.next().await.is_ok() {
            applied += 1;
        }
        info!(applied, "subscription closed");
        applied
    }

    /// Resubscribes, e.g. after the store closed the feed.
    ///
    /// The new subscription replays an added event for every existing record.
    pub async fn restart(&mut self) -> EngineResult<()> {
        self.subscription = self.repository.subscribe_users().await?;
        debug!(key = %self.session.user_key(), "resubscribed to users");
        Ok(())
    }

    fn fold(&self, event: ChangeEvent) -> Option<UserEvent> {
        let event = match event.decode_user() {
            Ok(event) => event,
            Err(e) => {
                warn!(key = %event.key, error = %e, "skipping undecodable event");
                return None;
            }
        };
        let own = self.session.apply(&event);
        self.stats.write().events_applied += 1;
        debug!(
            key = %event.key,
            sequence = event.sequence,
            own,
            "applied event"
        );
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Confirmed, EngineConfig, MemoryStore, RelationshipEngine};
    use amity_model::{AuthIdentity, Email, PeerStatus, UserKey};
    use serde_json::json;
    use std::sync::Arc;

    fn key(k: &str) -> UserKey {
        UserKey::new(k).unwrap()
    }

    fn email(e: &str) -> Email {
        Email::parse(e).unwrap()
    }

    fn store() -> Arc<MemoryStore> {
        Arc::new(
            MemoryStore::from_snapshot(json!({
                "users": {
                    "u1": { "email": "alice@x.com", "avatar": "a.png" },
                    "u2": { "email": "bob@x.com", "avatar": "b.png" }
                }
            }))
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn listener_replays_existing_records() {
        let engine = RelationshipEngine::new(EngineConfig::default(), store()).unwrap();
        let alice = engine
            .correlate(AuthIdentity::new(email("alice@x.com")))
            .await
            .unwrap();
        let mut listener = engine.listen(&alice).await.unwrap();

        assert_eq!(listener.drain(), 2);
        let users = alice.discover();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].avatar_url, "b.png");
        assert_eq!(engine.stats().events_applied, 2);
    }

    #[tokio::test]
    async fn peer_writes_reach_the_listener() {
        let store = store();
        let engine = RelationshipEngine::new(EngineConfig::default(), Arc::clone(&store)).unwrap();
        let alice = engine
            .correlate(AuthIdentity::new(email("alice@x.com")))
            .await
            .unwrap();
        let bob = engine
            .correlate(AuthIdentity::new(email("bob@x.com")))
            .await
            .unwrap();
        let mut bob_listener = engine.listen(&bob).await.unwrap();
        bob_listener.drain();

        engine
            .send_request(&alice, &key("u2"), &email("bob@x.com"))
            .await
            .unwrap();
        assert_eq!(bob.status_of(&key("u1")), PeerStatus::None);

        bob_listener.drain();
        assert_eq!(bob.status_of(&key("u1")), PeerStatus::RequestReceived);

        engine
            .reject(&bob, &key("u1"), Confirmed::by_user())
            .await
            .unwrap();
        let event = bob_listener.next().await.unwrap();
        assert!(event.record.is_some());
        bob_listener.drain();
        assert_eq!(bob.status_of(&key("u1")), PeerStatus::None);
    }

    #[tokio::test]
    async fn run_stops_when_feed_closes_and_restart_resubscribes() {
        let store = store();
        let engine = RelationshipEngine::new(EngineConfig::default(), Arc::clone(&store)).unwrap();
        let alice = engine
            .correlate(AuthIdentity::new(email("alice@x.com")))
            .await
            .unwrap();
        let mut listener = engine.listen(&alice).await.unwrap();

        store.close_subscriptions();
        assert_eq!(listener.run().await, 2);
        assert!(listener.next().await.is_err());

        listener.restart().await.unwrap();
        assert_eq!(listener.drain(), 2);
    }

    #[tokio::test]
    async fn undecodable_events_are_skipped() {
        let store = Arc::new(
            MemoryStore::from_snapshot(json!({
                "users": {
                    "u1": { "email": "alice@x.com" },
                    "u2": { "email": "bob@x.com", "friends": 7 }
                }
            }))
            .unwrap(),
        );
        let engine = RelationshipEngine::new(EngineConfig::default(), store).unwrap();
        let alice = engine
            .correlate(AuthIdentity::new(email("alice@x.com")))
            .await
            .unwrap();
        let mut listener = engine.listen(&alice).await.unwrap();
        assert_eq!(listener.drain(), 1);
    }
}
