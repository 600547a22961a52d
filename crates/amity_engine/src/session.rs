//! Authenticated sessions.

use crate::directory::{discover, DiscoveredUser};
use crate::projection::{Checkpoint, Projection, ProjectionSnapshot};
use amity_model::{AuthIdentity, Email, PeerStatus, UserEvent, UserKey, UserRecord};
use parking_lot::RwLock;

/// Prompt shown before rejecting a friend request.
pub const REJECT_PROMPT: &str =
    "Are you sure? The requestor will not be notified that you rejected their friend request.";

/// Prompt shown before unfriending.
pub const UNFRIEND_PROMPT: &str =
    "Are you sure? Your friend will not be notified that you unfriended them.";

/// Proof that the user confirmed a destructive transition.
///
/// Callers create it only after the user answered a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmed(());

impl Confirmed {
    /// Records that the user confirmed.
    pub fn by_user() -> Self {
        Confirmed(())
    }
}

/// An authenticated identity correlated with its user record.
///
/// Owns the local projection. Every transition and listener acts on an
/// explicit session.
#[derive(Debug)]
pub struct Session {
    identity: AuthIdentity,
    user_key: UserKey,
    projection: RwLock<Projection>,
}

impl Session {
    pub(crate) fn new(identity: AuthIdentity, user_key: UserKey, record: &UserRecord) -> Self {
        let mut projection = Projection::new(identity.email.clone());
        projection.seed(&user_key, record);
        Self {
            identity,
            user_key,
            projection: RwLock::new(projection),
        }
    }

    /// Returns the authenticated identity.
    pub fn identity(&self) -> &AuthIdentity {
        &self.identity
    }

    /// Returns the session email.
    pub fn email(&self) -> &Email {
        &self.identity.email
    }

    /// Returns the key of the session user's record.
    pub fn user_key(&self) -> &UserKey {
        &self.user_key
    }

    /// Returns a copy of the projection.
    pub fn projection(&self) -> Projection {
        self.projection.read().clone()
    }

    /// Returns a copy of the projected state.
    pub fn snapshot(&self) -> ProjectionSnapshot {
        self.projection.read().snapshot()
    }

    /// Status of `peer` as seen by the session user.
    pub fn status_of(&self, peer: &UserKey) -> PeerStatus {
        self.projection.read().status_of(peer)
    }

    /// Lists every other known user with their relationship status.
    pub fn discover(&self) -> Vec<DiscoveredUser> {
        discover(&self.snapshot(), &self.user_key)
    }

    /// Folds one change event into the projection.
    pub fn apply(&self, event: &UserEvent) -> bool {
        self.projection.write().apply(event)
    }

    pub(crate) fn inspect<R>(&self, f: impl FnOnce(&Projection) -> R) -> R {
        f(&self.projection.read())
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut Projection) -> R) -> R {
        f(&mut self.projection.write())
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        self.projection.read().checkpoint()
    }

    pub(crate) fn restore(&self, checkpoint: Checkpoint) -> bool {
        self.projection.write().restore(checkpoint)
    }
}
