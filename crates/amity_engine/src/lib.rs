//! # Amity Engine
//!
//! Friend-relationship synchronization engine.
//!
//! This crate provides:
//! - The `StoreClient` contract for the shared tree store, plus `MemoryStore`
//! - `Repository` for single-entry reads and patches of user records
//! - `RelationshipEngine` with the four transitions: send, accept, reject, unfriend
//! - `Session` and identity correlation (email index with scan fallback)
//! - `Projection` and `Listener` for folding change events into local state
//! - A read-only symmetry audit
//!
//! ## Architecture
//!
//! Presentation code calls a transition on the engine. The engine updates the
//! session's projection optimistically, then issues single-entry patches to
//! both user records. The store fans every mutation out to all subscribers,
//! including the actor's own listener, which replaces the projection with the
//! authoritative record.
//!
//! ## Key Invariants
//!
//! - Writes are scoped to one mapping entry; sub-mappings are never overwritten
//! - `accept` removes the pending pair before creating the friend pair
//! - Inbound events replace local state; they are never merged
//! - Partial writes are reported, not rolled back or retried

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod audit;
mod config;
mod directory;
mod engine;
mod error;
mod listener;
mod memory;
mod projection;
mod repository;
mod session;
mod store;

pub use audit::{audit_records, AuditReport};
pub use config::EngineConfig;
pub use directory::{discover, DirectoryEntry, DiscoveredUser};
pub use engine::{EngineStats, EntryWrite, RelationshipEngine, Transition};
pub use error::{EngineError, EngineResult, StoreError, StoreResult};
pub use listener::Listener;
pub use memory::MemoryStore;
pub use projection::{Checkpoint, Projection, ProjectionSnapshot};
pub use repository::{Repository, UnreadableRecord, UserScan};
pub use session::{Confirmed, Session, REJECT_PROMPT, UNFRIEND_PROMPT};
pub use store::{StoreClient, Subscription};
