//! Error types for the store client and the engine.

use crate::engine::Transition;
use amity_model::{Email, Mapping, ModelError, PeerStatus, UserKey};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors reported by a store client.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The client has no connection to the store.
    #[error("not connected to store")]
    NotConnected,

    /// The store failed to apply a request for a path.
    #[error("store unavailable for {path}: {message}")]
    Unavailable {
        /// Path of the failed request.
        path: String,
        /// Error message.
        message: String,
    },

    /// A value cannot be stored at the given path.
    #[error("invalid value at {path}: {message}")]
    InvalidValue {
        /// Target path.
        path: String,
        /// Error message.
        message: String,
    },

    /// A key or value failed model validation.
    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

impl StoreError {
    /// Creates an unavailable error for a path.
    pub fn unavailable(path: impl ToString, message: impl Into<String>) -> Self {
        Self::Unavailable {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Returns true if the request may succeed when repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::NotConnected | StoreError::Unavailable { .. })
    }
}

/// Errors that can occur during engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A store request failed before any write of the operation was applied.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Some writes of a transition were applied and a later one failed.
    ///
    /// The store is left asymmetric until a corrective write happens.
    #[error("{transition} partially applied ({applied} of {total} writes): {source}")]
    PartialWrite {
        /// Transition being applied.
        transition: Transition,
        /// Number of writes that succeeded.
        applied: usize,
        /// Number of writes in the transition.
        total: usize,
        /// Error of the first failed write.
        #[source]
        source: StoreError,
    },

    /// The entry a transition requires does not exist.
    #[error("no {mapping} entry for peer {peer}")]
    NotFound {
        /// Peer the entry was looked up for.
        peer: UserKey,
        /// Mapping that was searched.
        mapping: Mapping,
    },

    /// The session's email has no user record yet.
    #[error("identity {email} is not yet correlated with a user record")]
    IdentityNotCorrelated {
        /// Email of the authenticated identity.
        email: Email,
    },

    /// A user record already exists for the email.
    #[error("a user record already exists for {email}")]
    AlreadyRegistered {
        /// Email of the existing record.
        email: Email,
    },

    /// The transition is not allowed from the current local status.
    #[error("cannot {transition} while peer status is {status}")]
    InvalidTransition {
        /// Requested transition.
        transition: Transition,
        /// Local status of the peer.
        status: PeerStatus,
    },

    /// The peer argument is unusable.
    #[error("invalid peer: {0}")]
    InvalidPeer(String),

    /// Model validation or decoding failed.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// The store closed the subscription feed.
    #[error("subscription closed")]
    SubscriptionClosed,
}

impl EngineError {
    pub(crate) fn not_found(peer: &UserKey, mapping: Mapping) -> Self {
        EngineError::NotFound {
            peer: peer.clone(),
            mapping,
        }
    }

    /// Returns true if repeating the operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Store(e) => e.is_retryable(),
            EngineError::PartialWrite { source, .. } => source.is_retryable(),
            EngineError::IdentityNotCorrelated { .. } => true,
            EngineError::SubscriptionClosed => true,
            _ => false,
        }
    }

    /// Returns true if the error reports missing relationship state.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound { .. })
    }

    /// Returns the number of writes applied before the failure, if any were.
    pub fn applied_writes(&self) -> usize {
        match self {
            EngineError::PartialWrite { applied, .. } => *applied,
            _ => 0,
        }
    }
}
