//! Relationship synchronization engine.

use crate::audit::{audit_records, AuditReport};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::listener::Listener;
use crate::projection::Projection;
use crate::repository::Repository;
use crate::session::{Confirmed, Session};
use crate::store::StoreClient;
use amity_model::{
    AuthIdentity, Email, FriendEntry, Mapping, ModelResult, PeerStatus, RequestEntry, UserKey,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A relationship transition initiated by the session user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// `NONE` to pending, initiated by the sender.
    SendRequest,
    /// Pending to `FRIENDS`, initiated by the receiver.
    Accept,
    /// Pending to `NONE`, initiated by the receiver.
    Reject,
    /// `FRIENDS` to `NONE`.
    Unfriend,
}

impl Transition {
    /// Computes the store writes of the transition, in issue order.
    ///
    /// `accept` deletes the pending pair before it creates the friend pair.
    pub fn plan(
        self,
        self_key: &UserKey,
        self_email: &Email,
        peer: &UserKey,
        peer_email: &Email,
    ) -> ModelResult<Vec<EntryWrite>> {
        let writes = match self {
            Transition::SendRequest => vec![
                EntryWrite::put(
                    self_key,
                    Mapping::RequestsSent,
                    peer,
                    serde_json::to_value(RequestEntry::pending(peer_email.clone()))?,
                ),
                EntryWrite::put(
                    peer,
                    Mapping::RequestsReceived,
                    self_key,
                    serde_json::to_value(RequestEntry::pending(self_email.clone()))?,
                ),
            ],
            Transition::Accept => vec![
                EntryWrite::remove(self_key, Mapping::RequestsReceived, peer),
                EntryWrite::remove(peer, Mapping::RequestsSent, self_key),
                EntryWrite::put(
                    self_key,
                    Mapping::Friends,
                    peer,
                    serde_json::to_value(FriendEntry::new(peer_email.clone()))?,
                ),
                EntryWrite::put(
                    peer,
                    Mapping::Friends,
                    self_key,
                    serde_json::to_value(FriendEntry::new(self_email.clone()))?,
                ),
            ],
            Transition::Reject => vec![
                EntryWrite::remove(self_key, Mapping::RequestsReceived, peer),
                EntryWrite::remove(peer, Mapping::RequestsSent, self_key),
            ],
            Transition::Unfriend => vec![
                EntryWrite::remove(self_key, Mapping::Friends, peer),
                EntryWrite::remove(peer, Mapping::Friends, self_key),
            ],
        };
        Ok(writes)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transition::SendRequest => "send request",
            Transition::Accept => "accept",
            Transition::Reject => "reject",
            Transition::Unfriend => "unfriend",
        };
        f.write_str(name)
    }
}

/// A single-entry store write.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryWrite {
    /// Sets `owner.mapping[peer]`.
    Put {
        /// Record holding the entry.
        owner: UserKey,
        /// Mapping holding the entry.
        mapping: Mapping,
        /// Entry key.
        peer: UserKey,
        /// Entry value.
        value: Value,
    },
    /// Deletes `owner.mapping[peer]`.
    Remove {
        /// Record holding the entry.
        owner: UserKey,
        /// Mapping holding the entry.
        mapping: Mapping,
        /// Entry key.
        peer: UserKey,
    },
}

impl EntryWrite {
    fn put(owner: &UserKey, mapping: Mapping, peer: &UserKey, value: Value) -> Self {
        EntryWrite::Put {
            owner: owner.clone(),
            mapping,
            peer: peer.clone(),
            value,
        }
    }

    fn remove(owner: &UserKey, mapping: Mapping, peer: &UserKey) -> Self {
        EntryWrite::Remove {
            owner: owner.clone(),
            mapping,
            peer: peer.clone(),
        }
    }

    /// Returns the record the write touches.
    pub fn owner(&self) -> &UserKey {
        match self {
            EntryWrite::Put { owner, .. } | EntryWrite::Remove { owner, .. } => owner,
        }
    }

    /// Returns the mapping the write touches.
    pub fn mapping(&self) -> Mapping {
        match self {
            EntryWrite::Put { mapping, .. } | EntryWrite::Remove { mapping, .. } => *mapping,
        }
    }

    /// Returns the entry key.
    pub fn peer(&self) -> &UserKey {
        match self {
            EntryWrite::Put { peer, .. } | EntryWrite::Remove { peer, .. } => peer,
        }
    }

    /// Returns true for deletions.
    pub fn is_remove(&self) -> bool {
        matches!(self, EntryWrite::Remove { .. })
    }
}

impl fmt::Display for EntryWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = if self.is_remove() { "remove" } else { "put" };
        write!(f, "{op} {}.{}.{}", self.owner(), self.mapping(), self.peer())
    }
}

/// Statistics about engine operations.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Transitions whose writes all succeeded.
    pub transitions_completed: u64,
    /// Transitions that stopped after some writes were applied.
    pub partial_failures: u64,
    /// Operations that returned an error.
    pub failed_operations: u64,
    /// Change events folded into a projection.
    pub events_applied: u64,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Drives relationship transitions between user records.
///
/// Each transition checks its precondition, updates the session projection
/// optimistically and then issues its single-entry writes in a fixed order.
/// A write failure stops the transition. Writes already applied stay in the
/// store; the error reports how many there were.
pub struct RelationshipEngine<S: StoreClient> {
    config: EngineConfig,
    repository: Arc<Repository<S>>,
    stats: Arc<RwLock<EngineStats>>,
}

impl<S: StoreClient> RelationshipEngine<S> {
    /// Creates a new engine over a store client.
    pub fn new(config: EngineConfig, store: S) -> EngineResult<Self> {
        let repository = Repository::new(&config, store)?;
        Ok(Self {
            config,
            repository: Arc::new(repository),
            stats: Arc::new(RwLock::new(EngineStats::default())),
        })
    }

    /// Gets the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Gets the repository.
    pub fn repository(&self) -> &Arc<Repository<S>> {
        &self.repository
    }

    /// Gets the current stats.
    pub fn stats(&self) -> EngineStats {
        self.stats.read().clone()
    }

    /// Creates the user record for a newly authenticated identity.
    pub async fn register(&self, identity: &AuthIdentity) -> EngineResult<UserKey> {
        if self.repository.find_key_by_email(&identity.email).await?.is_some() {
            return Err(EngineError::AlreadyRegistered {
                email: identity.email.clone(),
            });
        }
        let key = self
            .repository
            .create_user(identity, &self.config.default_avatar_url)
            .await?;
        info!(key = %key, email = %identity.email, "registered user");
        Ok(key)
    }

    /// Resolves an authenticated identity to a session.
    ///
    /// Fails with [`EngineError::IdentityNotCorrelated`] while no record
    /// carries the identity's email, and with [`EngineError::Model`] when the
    /// record carrying it cannot be decoded.
    pub async fn correlate(&self, identity: AuthIdentity) -> EngineResult<Arc<Session>> {
        let not_correlated = || EngineError::IdentityNotCorrelated {
            email: identity.email.clone(),
        };
        let key = self
            .repository
            .find_key_by_email(&identity.email)
            .await?
            .ok_or_else(not_correlated)?;
        let record = self
            .repository
            .read_user(&key)
            .await?
            .ok_or_else(not_correlated)?;

        debug!(key = %key, email = %identity.email, "correlated session");
        Ok(Arc::new(Session::new(identity, key, &record)))
    }

    /// Subscribes a listener that keeps the session projection current.
    pub async fn listen(&self, session: &Arc<Session>) -> EngineResult<Listener<S>> {
        let subscription = self.repository.subscribe_users().await?;
        Ok(Listener::new(
            Arc::clone(&self.repository),
            Arc::clone(session),
            subscription,
            Arc::clone(&self.stats),
        ))
    }

    /// Sends a friend request to `peer`.
    pub async fn send_request(
        &self,
        session: &Session,
        peer: &UserKey,
        peer_email: &Email,
    ) -> EngineResult<()> {
        let result = self.try_send_request(session, peer, peer_email).await;
        self.finish(Transition::SendRequest, peer, result)
    }

    async fn try_send_request(
        &self,
        session: &Session,
        peer: &UserKey,
        peer_email: &Email,
    ) -> EngineResult<()> {
        self.check_peer(session, peer)?;
        if peer_email.is_empty() {
            return Err(EngineError::InvalidPeer(format!("{peer} has no email")));
        }
        let status = session.status_of(peer);
        if !status.can_send_request() {
            return Err(EngineError::InvalidTransition {
                transition: Transition::SendRequest,
                status,
            });
        }

        let writes =
            Transition::SendRequest.plan(session.user_key(), session.email(), peer, peer_email)?;
        self.execute(session, Transition::SendRequest, writes, |p| {
            p.mark_request_sent(peer, peer_email)
        })
        .await
    }

    /// Accepts the pending request received from `peer`.
    pub async fn accept(&self, session: &Session, peer: &UserKey) -> EngineResult<()> {
        let result = self.try_accept(session, peer).await;
        self.finish(Transition::Accept, peer, result)
    }

    async fn try_accept(&self, session: &Session, peer: &UserKey) -> EngineResult<()> {
        let request = self
            .require_request_received(session, Transition::Accept, peer)
            .await?;
        let peer_email = request.email;

        let writes =
            Transition::Accept.plan(session.user_key(), session.email(), peer, &peer_email)?;
        self.execute(session, Transition::Accept, writes, |p| {
            p.mark_accepted(peer, &peer_email)
        })
        .await
    }

    /// Rejects the pending request received from `peer`.
    ///
    /// The peer is not notified beyond the removal of their pending entry.
    pub async fn reject(
        &self,
        session: &Session,
        peer: &UserKey,
        _confirmed: Confirmed,
    ) -> EngineResult<()> {
        let result = self.try_reject(session, peer).await;
        self.finish(Transition::Reject, peer, result)
    }

    async fn try_reject(&self, session: &Session, peer: &UserKey) -> EngineResult<()> {
        let request = self
            .require_request_received(session, Transition::Reject, peer)
            .await?;

        let writes =
            Transition::Reject.plan(session.user_key(), session.email(), peer, &request.email)?;
        self.execute(session, Transition::Reject, writes, |p| {
            p.remove_request_received(peer)
        })
        .await
    }

    /// Removes the friendship with `peer`.
    pub async fn unfriend(
        &self,
        session: &Session,
        peer: &UserKey,
        _confirmed: Confirmed,
    ) -> EngineResult<()> {
        let result = self.try_unfriend(session, peer).await;
        self.finish(Transition::Unfriend, peer, result)
    }

    async fn try_unfriend(&self, session: &Session, peer: &UserKey) -> EngineResult<()> {
        self.check_peer(session, peer)?;
        if session.inspect(|p| p.friend(peer).is_none()) {
            return Err(EngineError::not_found(peer, Mapping::Friends));
        }
        let friend = self
            .repository
            .read_friend(session.user_key(), peer)
            .await?
            .ok_or_else(|| EngineError::not_found(peer, Mapping::Friends))?;

        let writes =
            Transition::Unfriend.plan(session.user_key(), session.email(), peer, &friend.email)?;
        self.execute(session, Transition::Unfriend, writes, |p| p.remove_friend(peer))
            .await
    }

    /// Updates the session user's avatar.
    pub async fn set_avatar(&self, session: &Session, avatar_url: &str) -> EngineResult<()> {
        self.repository
            .set_avatar(session.user_key(), avatar_url)
            .await?;
        debug!(key = %session.user_key(), "updated avatar");
        Ok(())
    }

    /// Scans every record and reports pairs that violate symmetry.
    pub async fn audit(&self) -> EngineResult<AuditReport> {
        let scan = self.repository.scan_users().await?;
        let report = audit_records(&scan);
        for finding in &report.asymmetries {
            warn!(%finding, "relationship asymmetry");
        }
        for record in &report.unreadable {
            warn!(key = %record.key, error = %record.error, "unreadable user record");
        }
        info!(
            users = report.records,
            asymmetries = report.asymmetries.len(),
            unreadable = report.unreadable.len(),
            "audit finished"
        );
        Ok(report)
    }

    fn check_peer(&self, session: &Session, peer: &UserKey) -> EngineResult<()> {
        if peer == session.user_key() {
            return Err(EngineError::InvalidPeer(format!(
                "{peer} is the session user"
            )));
        }
        Ok(())
    }

    async fn require_request_received(
        &self,
        session: &Session,
        transition: Transition,
        peer: &UserKey,
    ) -> EngineResult<RequestEntry> {
        self.check_peer(session, peer)?;
        let status = session.status_of(peer);
        if status == PeerStatus::Friends {
            return Err(EngineError::InvalidTransition { transition, status });
        }
        if session.inspect(|p| p.request_received(peer).is_none()) {
            return Err(EngineError::not_found(peer, Mapping::RequestsReceived));
        }
        self.repository
            .read_request_received(session.user_key(), peer)
            .await?
            .ok_or_else(|| EngineError::not_found(peer, Mapping::RequestsReceived))
    }

    /// Applies the optimistic update, then issues the writes in order.
    async fn execute(
        &self,
        session: &Session,
        transition: Transition,
        writes: Vec<EntryWrite>,
        optimistic: impl FnOnce(&mut Projection),
    ) -> EngineResult<()> {
        let checkpoint = if self.config.optimistic_updates {
            let checkpoint = session.checkpoint();
            session.update(optimistic);
            Some(checkpoint)
        } else {
            None
        };

        let total = writes.len();
        for (applied, write) in writes.into_iter().enumerate() {
            debug!(%transition, %write, "issuing write");
            let value = match &write {
                EntryWrite::Put { value, .. } => Some(value.clone()),
                EntryWrite::Remove { .. } => None,
            };
            let result = self
                .repository
                .patch_entry(write.owner(), write.mapping(), write.peer(), value)
                .await;

            if let Err(source) = result {
                if applied == 0 {
                    if let Some(checkpoint) = checkpoint {
                        if session.restore(checkpoint) {
                            debug!(%transition, "rolled back optimistic update");
                        }
                    }
                    return Err(EngineError::Store(source));
                }
                warn!(
                    %transition,
                    applied,
                    total,
                    error = %source,
                    "transition partially applied"
                );
                return Err(EngineError::PartialWrite {
                    transition,
                    applied,
                    total,
                    source,
                });
            }
        }
        Ok(())
    }

    fn finish(
        &self,
        transition: Transition,
        peer: &UserKey,
        result: EngineResult<()>,
    ) -> EngineResult<()> {
        let mut stats = self.stats.write();
        match &result {
            Ok(()) => {
                stats.transitions_completed += 1;
                info!(%transition, peer = %peer, "transition completed");
            }
            Err(e) => {
                if matches!(e, EngineError::PartialWrite { .. }) {
                    stats.partial_failures += 1;
                }
                stats.failed_operations += 1;
                stats.last_error = Some(e.to_string());
                debug!(%transition, peer = %peer, error = %e, "transition failed");
            }
        }
        result
    }
}
