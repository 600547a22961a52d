//! Relationship derivation and the symmetry invariant.

use crate::identity::UserKey;
use crate::record::{Mapping, UserRecord};
use std::fmt;

/// Status of a peer from the perspective of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PeerStatus {
    /// No relationship.
    #[default]
    None,
    /// This user sent a request that is still pending.
    RequestSent,
    /// The peer sent a request that is still pending.
    RequestReceived,
    /// Confirmed friends.
    Friends,
}

impl PeerStatus {
    /// Returns the status as the peer sees it.
    pub fn mirrored(self) -> Self {
        match self {
            PeerStatus::RequestSent => PeerStatus::RequestReceived,
            PeerStatus::RequestReceived => PeerStatus::RequestSent,
            other => other,
        }
    }

    /// Derives a status from which of one user's mappings hold the peer.
    ///
    /// A locally inconsistent record can hold more than one entry for the
    /// same peer; friendship wins over a received request, which wins over
    /// a sent one.
    pub fn from_entries(friends: bool, requests_received: bool, requests_sent: bool) -> Self {
        if friends {
            PeerStatus::Friends
        } else if requests_received {
            PeerStatus::RequestReceived
        } else if requests_sent {
            PeerStatus::RequestSent
        } else {
            PeerStatus::None
        }
    }

    /// Returns true if a request may be sent from this status.
    pub fn can_send_request(self) -> bool {
        self == PeerStatus::None
    }
}

impl fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PeerStatus::None => "none",
            PeerStatus::RequestSent => "request sent",
            PeerStatus::RequestReceived => "request received",
            PeerStatus::Friends => "friends",
        };
        f.write_str(label)
    }
}

/// Logical state of the relationship between two users.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationshipState {
    /// No entries on either side.
    None,
    /// `from` sent a request to `to`.
    Pending {
        /// Requesting user.
        from: UserKey,
        /// Requested user.
        to: UserKey,
    },
    /// Both friend entries present.
    Friends,
}

impl RelationshipState {
    /// Returns the status of `peer` as seen by `viewer`.
    pub fn status_for(&self, viewer: &UserKey) -> PeerStatus {
        match self {
            RelationshipState::None => PeerStatus::None,
            RelationshipState::Friends => PeerStatus::Friends,
            RelationshipState::Pending { from, .. } if from == viewer => PeerStatus::RequestSent,
            RelationshipState::Pending { .. } => PeerStatus::RequestReceived,
        }
    }
}

/// Reference to one stored relationship entry, e.g. `u1.requestsSent.u2`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryRef {
    /// Record holding the entry.
    pub owner: UserKey,
    /// Mapping holding the entry.
    pub mapping: Mapping,
    /// Key of the entry inside the mapping.
    pub peer: UserKey,
}

impl fmt::Display for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.owner, self.mapping, self.peer)
    }
}

/// A pair of records whose entries do not form a legal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asymmetry {
    /// First user of the pair.
    pub first: UserKey,
    /// Second user of the pair.
    pub second: UserKey,
    /// Entries that are present.
    pub present: Vec<EntryRef>,
}

impl fmt::Display for Asymmetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asymmetric pair {} / {}: present [", self.first, self.second)?;
        for (i, entry) in self.present.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{entry}")?;
        }
        f.write_str("]")
    }
}

/// Derives the relationship between two records.
///
/// Legal states are: no entries, the two pending entries of one direction,
/// or the two friend entries. Anything else is reported as an [`Asymmetry`].
pub fn derive_relationship(
    a_key: &UserKey,
    a: &UserRecord,
    b_key: &UserKey,
    b: &UserRecord,
) -> Result<RelationshipState, Asymmetry> {
    let candidates = [
        (a_key, a, Mapping::RequestsSent, b_key),
        (a_key, a, Mapping::RequestsReceived, b_key),
        (a_key, a, Mapping::Friends, b_key),
        (b_key, b, Mapping::RequestsSent, a_key),
        (b_key, b, Mapping::RequestsReceived, a_key),
        (b_key, b, Mapping::Friends, a_key),
    ];
    let present: Vec<EntryRef> = candidates
        .iter()
        .filter(|(_, record, mapping, peer)| record.has_entry(*mapping, peer))
        .map(|(owner, _, mapping, peer)| EntryRef {
            owner: (*owner).clone(),
            mapping: *mapping,
            peer: (*peer).clone(),
        })
        .collect();

    let has = |owner: &UserKey, mapping: Mapping| {
        present
            .iter()
            .any(|e| &e.owner == owner && e.mapping == mapping)
    };

    let state = match present.len() {
        0 => Some(RelationshipState::None),
        2 if has(a_key, Mapping::RequestsSent) && has(b_key, Mapping::RequestsReceived) => {
            Some(RelationshipState::Pending {
                from: a_key.clone(),
                to: b_key.clone(),
            })
        }
        2 if has(b_key, Mapping::RequestsSent) && has(a_key, Mapping::RequestsReceived) => {
            Some(RelationshipState::Pending {
                from: b_key.clone(),
                to: a_key.clone(),
            })
        }
        2 if has(a_key, Mapping::Friends) && has(b_key, Mapping::Friends) => {
            Some(RelationshipState::Friends)
        }
        _ => None,
    };

    state.ok_or_else(|| Asymmetry {
        first: a_key.clone(),
        second: b_key.clone(),
        present,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Email;
    use crate::record::{FriendEntry, RequestEntry};

    fn key(k: &str) -> UserKey {
        UserKey::new(k).unwrap()
    }

    fn email(e: &str) -> Email {
        Email::parse(e).unwrap()
    }

    #[test]
    fn entry_precedence() {
        assert_eq!(PeerStatus::from_entries(false, false, false), PeerStatus::None);
        assert_eq!(PeerStatus::from_entries(false, false, true), PeerStatus::RequestSent);
        assert_eq!(
            PeerStatus::from_entries(false, true, true),
            PeerStatus::RequestReceived
        );
        assert_eq!(PeerStatus::from_entries(true, true, true), PeerStatus::Friends);
    }

    fn pair() -> (UserKey, UserRecord, UserKey, UserRecord) {
        (
            key("u1"),
            UserRecord::new(email("alice@x.com"), ""),
            key("u2"),
            UserRecord::new(email("bob@x.com"), ""),
        )
    }

    #[test]
    fn empty_pair_is_none() {
        let (k1, a, k2, b) = pair();
        assert_eq!(
            derive_relationship(&k1, &a, &k2, &b).unwrap(),
            RelationshipState::None
        );
    }

    #[test]
    fn pending_pair_in_both_orders() {
        let (k1, mut a, k2, mut b) = pair();
        a.requests_sent
            .insert(k2.clone(), RequestEntry::pending(email("bob@x.com")));
        b.requests_received
            .insert(k1.clone(), RequestEntry::pending(email("alice@x.com")));

        let expected = RelationshipState::Pending {
            from: k1.clone(),
            to: k2.clone(),
        };
        assert_eq!(derive_relationship(&k1, &a, &k2, &b).unwrap(), expected);
        assert_eq!(derive_relationship(&k2, &b, &k1, &a).unwrap(), expected);
        assert_eq!(expected.status_for(&k1), PeerStatus::RequestSent);
        assert_eq!(expected.status_for(&k2), PeerStatus::RequestReceived);
    }

    #[test]
    fn friends_pair() {
        let (k1, mut a, k2, mut b) = pair();
        a.friends.insert(k2.clone(), FriendEntry::new(email("bob@x.com")));
        b.friends.insert(k1.clone(), FriendEntry::new(email("alice@x.com")));
        assert_eq!(
            derive_relationship(&k1, &a, &k2, &b).unwrap(),
            RelationshipState::Friends
        );
    }

    #[test]
    fn half_request_is_asymmetric() {
        let (k1, mut a, k2, b) = pair();
        a.requests_sent
            .insert(k2.clone(), RequestEntry::pending(email("bob@x.com")));

        let asymmetry = derive_relationship(&k1, &a, &k2, &b).unwrap_err();
        assert_eq!(asymmetry.present.len(), 1);
        assert_eq!(asymmetry.present[0].to_string(), "u1.requestsSent.u2");
        assert!(asymmetry.to_string().contains("u1 / u2"));
    }

    #[test]
    fn friends_with_leftover_request_is_asymmetric() {
        let (k1, mut a, k2, mut b) = pair();
        a.friends.insert(k2.clone(), FriendEntry::new(email("bob@x.com")));
        b.friends.insert(k1.clone(), FriendEntry::new(email("alice@x.com")));
        b.requests_sent
            .insert(k1.clone(), RequestEntry::pending(email("alice@x.com")));
        assert!(derive_relationship(&k1, &a, &k2, &b).is_err());
    }

    #[test]
    fn mirrored_status() {
        assert_eq!(PeerStatus::RequestSent.mirrored(), PeerStatus::RequestReceived);
        assert_eq!(PeerStatus::Friends.mirrored(), PeerStatus::Friends);
        assert!(PeerStatus::None.can_send_request());
        assert!(!PeerStatus::RequestReceived.can_send_request());
    }
}
