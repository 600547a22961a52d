//! # Amity Model
//!
//! Data model for the Amity friend-relationship engine.
//!
//! This crate provides:
//! - `UserKey`, `Email` and `AuthIdentity` identifiers
//! - `StorePath` for addressing the shared tree store
//! - `UserRecord` with its `friends`, `requestsSent` and `requestsReceived` mappings
//! - Relationship derivation and symmetry checking for a pair of records
//! - `ChangeEvent` as delivered by store subscriptions
//!
//! This is a pure model crate with no I/O operations.
//!
//! ## Key Invariants
//!
//! - A relationship is never stored; it is derived from up to four entries
//! - The four entries of a pair agree: all absent, both pending, or both friends
//! - Entries with an empty email are placeholders and are ignored on read

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change;
mod error;
mod identity;
mod path;
mod record;
mod relationship;

pub use change::{ChangeEvent, ChangeType, UserEvent};
pub use error::{ModelError, ModelResult};
pub use identity::{AuthIdentity, Email, UserKey};
pub use path::{validate_segment, StorePath};
pub use record::{FriendEntry, Mapping, RequestEntry, RequestStatus, UserRecord};
pub use relationship::{
    derive_relationship, Asymmetry, EntryRef, PeerStatus, RelationshipState,
};

/// Avatar assigned to every new user record until changed.
pub const DEFAULT_AVATAR_URL: &str = "https://firebasestorage.googleapis.com/v0/b/animap-2deae.appspot.com/o/profiles%2Fbear-profile-green.png?alt=media&token=65716337-7289-4f92-9409-32a11c43e666";
