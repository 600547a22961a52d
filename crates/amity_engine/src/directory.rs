//! Discovery of other users.

use crate::projection::ProjectionSnapshot;
use amity_model::{Email, PeerStatus, UserKey};

/// A known user as recorded by the listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Email of the user.
    pub email: Email,
    /// Avatar image URL.
    pub avatar_url: String,
}

/// Another user together with their relationship to the session user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredUser {
    /// Record key.
    pub key: UserKey,
    /// Email of the user.
    pub email: Email,
    /// Avatar image URL.
    pub avatar_url: String,
    /// Status as seen by the session user.
    pub status: PeerStatus,
}

/// Lists every user except `self_key`, ordered by email.
pub fn discover(snapshot: &ProjectionSnapshot, self_key: &UserKey) -> Vec<DiscoveredUser> {
    let mut users: Vec<DiscoveredUser> = snapshot
        .directory
        .iter()
        .filter(|(key, entry)| *key != self_key && !entry.email.is_empty())
        .map(|(key, entry)| DiscoveredUser {
            key: key.clone(),
            email: entry.email.clone(),
            avatar_url: entry.avatar_url.clone(),
            status: snapshot.status_of(key),
        })
        .collect();
    users.sort_by(|a, b| a.email.as_str().cmp(b.email.as_str()));
    users
}
