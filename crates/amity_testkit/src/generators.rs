//! Property-based test generators using proptest.
//!
//! Provides strategies for identifiers and for random sequences of
//! relationship actions between seeded users.

use amity_model::{Email, UserKey};
use proptest::prelude::*;

/// Strategy for generating valid record keys.
pub fn user_key_strategy() -> impl Strategy<Value = UserKey> {
    prop::string::string_regex("[A-Za-z0-9_-]{1,20}")
        .expect("Invalid regex")
        .prop_map(|s| UserKey::new(s).expect("Regex yields valid keys"))
}

/// Strategy for generating valid emails, including dotted local parts.
pub fn email_strategy() -> impl Strategy<Value = Email> {
    (
        prop::string::string_regex("[a-z][a-z0-9.+_]{0,11}").expect("Invalid regex"),
        prop::string::string_regex("[a-z]{1,8}\\.(com|org|io)").expect("Invalid regex"),
    )
        .prop_map(|(local, domain)| {
            Email::parse(format!("{local}@{domain}")).expect("Regex yields valid emails")
        })
}

/// A relationship transition attempted by one seeded user against another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// `actor` sends a request to `peer`.
    Send {
        /// Acting user index.
        actor: usize,
        /// Peer index.
        peer: usize,
    },
    /// `actor` accepts the request from `peer`.
    Accept {
        /// Acting user index.
        actor: usize,
        /// Peer index.
        peer: usize,
    },
    /// `actor` rejects the request from `peer`.
    Reject {
        /// Acting user index.
        actor: usize,
        /// Peer index.
        peer: usize,
    },
    /// `actor` unfriends `peer`.
    Unfriend {
        /// Acting user index.
        actor: usize,
        /// Peer index.
        peer: usize,
    },
}

/// Strategy for one action among `users` seeded users.
///
/// Actor and peer may coincide so that self-targeting is exercised too.
pub fn action_strategy(users: usize) -> impl Strategy<Value = Action> {
    (0..4u8, 0..users, 0..users).prop_map(|(kind, actor, peer)| match kind {
        0 => Action::Send { actor, peer },
        1 => Action::Accept { actor, peer },
        2 => Action::Reject { actor, peer },
        _ => Action::Unfriend { actor, peer },
    })
}

/// Strategy for a sequence of actions.
pub fn action_sequence_strategy(
    users: usize,
    max_len: usize,
) -> impl Strategy<Value = Vec<Action>> {
    prop::collection::vec(action_strategy(users), 1..=max_len)
}

/// Case budget for the relationship property tests.
///
/// Every case replays an action sequence against a fresh store, so runs are
/// kept short.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
