//! Local projection of the session user's relationship state.

use crate::directory::DirectoryEntry;
use amity_model::{
    ChangeType, Email, FriendEntry, PeerStatus, RequestEntry, UserEvent, UserKey, UserRecord,
};
use std::collections::BTreeMap;
use tracing::debug;

/// A copy of the projected state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionSnapshot {
    /// Incoming pending requests by peer key.
    pub requests_received: BTreeMap<UserKey, RequestEntry>,
    /// Outgoing pending requests by peer key.
    pub requests_sent: BTreeMap<UserKey, RequestEntry>,
    /// Confirmed friends by peer key.
    pub friends: BTreeMap<UserKey, FriendEntry>,
    /// Every known user, including the session user.
    pub directory: BTreeMap<UserKey, DirectoryEntry>,
}

impl ProjectionSnapshot {
    /// Status of `peer` as seen by the session user.
    pub fn status_of(&self, peer: &UserKey) -> PeerStatus {
        PeerStatus::from_entries(
            self.friends.contains_key(peer),
            self.requests_received.contains_key(peer),
            self.requests_sent.contains_key(peer),
        )
    }

    fn replace_mappings(&mut self, record: &UserRecord) {
        self.requests_received = record.requests_received.clone();
        self.requests_sent = record.requests_sent.clone();
        self.friends = record.friends.clone();
    }

    fn clear_mappings(&mut self) {
        self.requests_received.clear();
        self.requests_sent.clear();
        self.friends.clear();
    }
}

/// Relationship state saved before an optimistic update.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    revision: u64,
    requests_received: BTreeMap<UserKey, RequestEntry>,
    requests_sent: BTreeMap<UserKey, RequestEntry>,
    friends: BTreeMap<UserKey, FriendEntry>,
}

/// In-memory view of "my requests" and "my friends".
///
/// Inbound events for the session user's record replace the three mappings
/// wholesale, so applying the same event twice, or a stale event followed by
/// a fresh one, converges on the last delivered record. The revision counts
/// applied self events and lets an optimistic update detect whether the
/// store already overwrote it.
#[derive(Debug, Clone)]
pub struct Projection {
    email: Email,
    self_key: Option<UserKey>,
    state: ProjectionSnapshot,
    revision: u64,
}

impl Projection {
    /// Creates an empty projection for the session email.
    pub fn new(email: Email) -> Self {
        Self {
            email,
            self_key: None,
            state: ProjectionSnapshot::default(),
            revision: 0,
        }
    }

    /// Returns the session email.
    pub fn email(&self) -> &Email {
        &self.email
    }

    /// Returns the key of the session user's record once it has been seen.
    pub fn self_key(&self) -> Option<&UserKey> {
        self.self_key.as_ref()
    }

    /// Returns the number of self events applied so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns a copy of the projected state.
    pub fn snapshot(&self) -> ProjectionSnapshot {
        self.state.clone()
    }

    /// Status of `peer` as seen by the session user.
    pub fn status_of(&self, peer: &UserKey) -> PeerStatus {
        self.state.status_of(peer)
    }

    /// Returns the pending request received from `peer`, if any.
    pub fn request_received(&self, peer: &UserKey) -> Option<&RequestEntry> {
        self.state.requests_received.get(peer)
    }

    /// Returns the friend entry for `peer`, if any.
    pub fn friend(&self, peer: &UserKey) -> Option<&FriendEntry> {
        self.state.friends.get(peer)
    }

    /// Replaces the relationship mappings with a record read directly.
    pub fn seed(&mut self, key: &UserKey, record: &UserRecord) {
        self.self_key = Some(key.clone());
        self.record_directory(key, record, true);
        self.state.replace_mappings(record);
        self.revision += 1;
    }

    /// Folds one change event into the projection.
    ///
    /// Returns true if the event concerned the session user's record.
    pub fn apply(&mut self, event: &UserEvent) -> bool {
        match (&event.change_type, &event.record) {
            (ChangeType::Removed, _) | (_, None) => {
                self.state.directory.remove(&event.key);
                if self.self_key.as_ref() != Some(&event.key) {
                    return false;
                }
                self.state.clear_mappings();
                self.revision += 1;
                debug!(key = %event.key, "own record removed");
                true
            }
            (change_type, Some(record)) => {
                let overwrite = *change_type == ChangeType::Changed;
                self.record_directory(&event.key, record, overwrite);
                if record.email != self.email {
                    return false;
                }
                self.self_key = Some(event.key.clone());
                self.state.replace_mappings(record);
                self.revision += 1;
                debug!(
                    key = %event.key,
                    sequence = event.sequence,
                    revision = self.revision,
                    "replaced own relationship state"
                );
                true
            }
        }
    }

    fn record_directory(&mut self, key: &UserKey, record: &UserRecord, overwrite: bool) {
        if record.email.is_empty() {
            return;
        }
        let entry = DirectoryEntry {
            email: record.email.clone(),
            avatar_url: record.avatar_url.clone(),
        };
        if overwrite {
            self.state.directory.insert(key.clone(), entry);
        } else {
            self.state.directory.entry(key.clone()).or_insert(entry);
        }
    }

    /// Records an outgoing request before the store confirms it.
    pub fn mark_request_sent(&mut self, peer: &UserKey, peer_email: &Email) {
        self.state
            .requests_sent
            .insert(peer.clone(), RequestEntry::pending(peer_email.clone()));
    }

    /// Moves a received request to the friends mapping.
    pub fn mark_accepted(&mut self, peer: &UserKey, peer_email: &Email) {
        self.state.requests_received.remove(peer);
        self.state
            .friends
            .insert(peer.clone(), FriendEntry::new(peer_email.clone()));
    }

    /// Drops a received request.
    pub fn remove_request_received(&mut self, peer: &UserKey) {
        self.state.requests_received.remove(peer);
    }

    /// Drops a friend.
    pub fn remove_friend(&mut self, peer: &UserKey) {
        self.state.friends.remove(peer);
    }

    /// Saves the relationship mappings.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            revision: self.revision,
            requests_received: self.state.requests_received.clone(),
            requests_sent: self.state.requests_sent.clone(),
            friends: self.state.friends.clone(),
        }
    }

    /// Restores a checkpoint unless a self event was applied since it was taken.
    pub fn restore(&mut self, checkpoint: Checkpoint) -> bool {
        if checkpoint.revision != self.revision {
            return false;
        }
        self.state.requests_received = checkpoint.requests_received;
        self.state.requests_sent = checkpoint.requests_sent;
        self.state.friends = checkpoint.friends;
        true
    }
}
