//! Read-only symmetry audit over all user records.

use crate::repository::{UnreadableRecord, UserScan};
use amity_model::{derive_relationship, Asymmetry, UserRecord};
use std::collections::BTreeSet;

/// Outcome of a symmetry audit.
#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    /// Number of records that decoded.
    pub records: usize,
    /// Pairs whose entries do not form a legal state.
    pub asymmetries: Vec<Asymmetry>,
    /// Records that could not be decoded. Pairs involving them are not checked.
    pub unreadable: Vec<UnreadableRecord>,
}

impl AuditReport {
    /// Returns true if every record decoded and every pair is symmetric.
    pub fn is_clean(&self) -> bool {
        self.asymmetries.is_empty() && self.unreadable.is_empty()
    }
}

/// Reports every pair of records whose entries do not form a legal state.
///
/// Pairs are found through the entries themselves, so a record referencing
/// a missing peer is reported against an empty peer record. Entries a record
/// holds for its own key are ignored, and so are pairs with an unreadable
/// record, since its entries are unknown.
pub fn audit_records(scan: &UserScan) -> AuditReport {
    let users = &scan.records;
    let mut pairs = BTreeSet::new();
    for (owner, record) in users {
        for peer in record.peers() {
            if peer == owner || scan.is_unreadable(peer) {
                continue;
            }
            let pair = if owner < peer {
                (owner.clone(), peer.clone())
            } else {
                (peer.clone(), owner.clone())
            };
            pairs.insert(pair);
        }
    }

    let missing = UserRecord::default();
    let asymmetries = pairs
        .into_iter()
        .filter_map(|(a, b)| {
            let a_record = users.get(&a).unwrap_or(&missing);
            let b_record = users.get(&b).unwrap_or(&missing);
            derive_relationship(&a, a_record, &b, b_record).err()
        })
        .collect();

    AuditReport {
        records: users.len(),
        asymmetries,
        unreadable: scan.unreadable.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amity_model::{Email, FriendEntry, Mapping, RequestEntry, UserKey};
    use std::collections::BTreeMap;

    fn key(k: &str) -> UserKey {
        UserKey::new(k).unwrap()
    }

    fn record(e: &str) -> UserRecord {
        UserRecord::new(Email::parse(e).unwrap(), "")
    }

    fn scan(records: BTreeMap<UserKey, UserRecord>) -> UserScan {
        UserScan {
            records,
            unreadable: Vec::new(),
        }
    }

    #[test]
    fn consistent_records_have_no_findings() {
        let mut alice = record("alice@x.com");
        let mut bob = record("bob@x.com");
        let mut carol = record("carol@x.com");
        alice
            .requests_sent
            .insert(key("u2"), RequestEntry::pending(bob.email.clone()));
        bob.requests_received
            .insert(key("u1"), RequestEntry::pending(alice.email.clone()));
        alice
            .friends
            .insert(key("u3"), FriendEntry::new(carol.email.clone()));
        carol
            .friends
            .insert(key("u1"), FriendEntry::new(alice.email.clone()));

        let users = BTreeMap::from([(key("u1"), alice), (key("u2"), bob), (key("u3"), carol)]);
        let report = audit_records(&scan(users));
        assert!(report.is_clean());
        assert_eq!(report.records, 3);
    }

    #[test]
    fn half_friendship_is_reported() {
        let mut alice = record("alice@x.com");
        let bob = record("bob@x.com");
        alice
            .friends
            .insert(key("u2"), FriendEntry::new(bob.email.clone()));

        let users = BTreeMap::from([(key("u1"), alice), (key("u2"), bob)]);
        let findings = audit_records(&scan(users)).asymmetries;
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].first, key("u1"));
        assert_eq!(findings[0].second, key("u2"));
        assert_eq!(findings[0].present.len(), 1);
        assert_eq!(findings[0].present[0].mapping, Mapping::Friends);
    }

    #[test]
    fn dangling_peer_and_self_entries() {
        let mut alice = record("alice@x.com");
        alice.requests_received.insert(
            key("u9"),
            RequestEntry::pending(Email::parse("ghost@x.com").unwrap()),
        );
        alice.friends.insert(
            key("u1"),
            FriendEntry::new(Email::parse("alice@x.com").unwrap()),
        );

        let users = BTreeMap::from([(key("u1"), alice)]);
        let findings = audit_records(&scan(users)).asymmetries;
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].second, key("u9"));
    }

    #[test]
    fn pairs_with_unreadable_records_are_not_checked() {
        let mut alice = record("alice@x.com");
        alice
            .friends
            .insert(key("u2"), FriendEntry::new(Email::parse("bob@x.com").unwrap()));
        alice.friends.insert(
            key("u3"),
            FriendEntry::new(Email::parse("carol@x.com").unwrap()),
        );

        let scan = UserScan {
            records: BTreeMap::from([(key("u1"), alice)]),
            unreadable: vec![UnreadableRecord {
                key: "u2".into(),
                email: Some("bob@x.com".into()),
                error: "codec error".into(),
            }],
        };
        let report = audit_records(&scan);
        assert_eq!(report.asymmetries.len(), 1);
        assert_eq!(report.asymmetries[0].second, key("u3"));
        assert_eq!(report.unreadable.len(), 1);
        assert!(!report.is_clean());
    }
}
