//! # Amity Testkit
//!
//! Test utilities for Amity.
//!
//! This crate provides:
//! - Fixtures: a store seeded with users, each with a session and listener
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use amity_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn alice_befriends_bob() {
//!     let mut world = TestWorld::alice_and_bob().await;
//!     world.send(0, 1).await.unwrap();
//!     world.sync();
//!     world.accept(1, 0).await.unwrap();
//!     world.sync();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
