//! User records and their relationship mappings.

use crate::error::ModelResult;
use crate::identity::{Email, UserKey};
use crate::relationship::PeerStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Status carried by a pending request entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// The request awaits an answer.
    Pending,
    /// A status written by another client that this model does not know.
    #[serde(other)]
    Unrecognized,
}

/// Entry in a user's `friends` mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendEntry {
    /// Email of the friend.
    pub email: Email,
}

impl FriendEntry {
    /// Creates a friend entry.
    pub fn new(email: Email) -> Self {
        Self { email }
    }
}

/// Entry in a user's `requestsSent` or `requestsReceived` mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEntry {
    /// Email of the other party.
    pub email: Email,
    /// Request status; absent on legacy entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RequestStatus>,
}

impl RequestEntry {
    /// Creates a pending request entry.
    pub fn pending(email: Email) -> Self {
        Self {
            email,
            status: Some(RequestStatus::Pending),
        }
    }
}

/// One of the three relationship mappings of a user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mapping {
    /// Confirmed friends.
    Friends,
    /// Requests this user initiated.
    RequestsSent,
    /// Requests directed at this user.
    RequestsReceived,
}

impl Mapping {
    /// Field name of the mapping inside a stored record.
    pub fn field_name(&self) -> &'static str {
        match self {
            Mapping::Friends => "friends",
            Mapping::RequestsSent => "requestsSent",
            Mapping::RequestsReceived => "requestsReceived",
        }
    }
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// A user record as stored under the users collection.
///
/// Records are always written with `avatarUrl`. On read the legacy `avatar`
/// field is accepted too, and `avatarUrl` wins when both are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredUserRecord")]
pub struct UserRecord {
    /// Authentication user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Email used to correlate a session with this record.
    pub email: Email,
    /// Avatar image URL.
    pub avatar_url: String,
    /// Confirmed friends by peer key.
    pub friends: BTreeMap<UserKey, FriendEntry>,
    /// Outgoing pending requests by peer key.
    pub requests_sent: BTreeMap<UserKey, RequestEntry>,
    /// Incoming pending requests by peer key.
    pub requests_received: BTreeMap<UserKey, RequestEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredUserRecord {
    #[serde(default)]
    uid: Option<String>,
    #[serde(default)]
    email: Email,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
    #[serde(default)]
    friends: BTreeMap<UserKey, FriendEntry>,
    #[serde(default)]
    requests_sent: BTreeMap<UserKey, RequestEntry>,
    #[serde(default)]
    requests_received: BTreeMap<UserKey, RequestEntry>,
}

impl From<StoredUserRecord> for UserRecord {
    fn from(stored: StoredUserRecord) -> Self {
        Self {
            uid: stored.uid,
            email: stored.email,
            avatar_url: stored.avatar_url.or(stored.avatar).unwrap_or_default(),
            friends: stored.friends,
            requests_sent: stored.requests_sent,
            requests_received: stored.requests_received,
        }
    }
}

impl UserRecord {
    /// Creates a record with empty relationship mappings.
    pub fn new(email: Email, avatar_url: impl Into<String>) -> Self {
        Self {
            uid: None,
            email,
            avatar_url: avatar_url.into(),
            ..Self::default()
        }
    }

    /// Sets the authentication user id.
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Decodes a stored value, dropping placeholder entries.
    pub fn from_value(value: Value) -> ModelResult<Self> {
        let mut record: UserRecord = serde_json::from_value(value)?;
        record.strip_placeholders();
        Ok(record)
    }

    /// Encodes the record for storage.
    pub fn to_value(&self) -> ModelResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Removes entries whose email is empty.
    pub fn strip_placeholders(&mut self) {
        self.friends.retain(|_, entry| !entry.email.is_empty());
        self.requests_sent.retain(|_, entry| !entry.email.is_empty());
        self.requests_received.retain(|_, entry| !entry.email.is_empty());
    }

    /// Returns true if the mapping holds an entry for `peer`.
    pub fn has_entry(&self, mapping: Mapping, peer: &UserKey) -> bool {
        match mapping {
            Mapping::Friends => self.friends.contains_key(peer),
            Mapping::RequestsSent => self.requests_sent.contains_key(peer),
            Mapping::RequestsReceived => self.requests_received.contains_key(peer),
        }
    }

    /// Returns every peer key mentioned by any mapping.
    pub fn peers(&self) -> impl Iterator<Item = &UserKey> {
        self.friends
            .keys()
            .chain(self.requests_sent.keys())
            .chain(self.requests_received.keys())
    }

    /// Status of `peer` as seen from this record alone.
    pub fn status_of(&self, peer: &UserKey) -> PeerStatus {
        PeerStatus::from_entries(
            self.friends.contains_key(peer),
            self.requests_received.contains_key(peer),
            self.requests_sent.contains_key(peer),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(k: &str) -> UserKey {
        UserKey::new(k).unwrap()
    }

    #[test]
    fn decode_legacy_record_with_placeholders() {
        let value = json!({
            "uid": "abc",
            "email": "alice@x.com",
            "avatar": "https://img/a.png",
            "requestsReceived": { "userKey": { "email": "", "status": null } },
            "requestsSent": {
                "userKey": { "email": "", "status": null },
                "u2": { "email": "bob@x.com", "status": "pending" }
            },
            "friends": { "userKey": { "email": "", "status": null } }
        });

        let record = UserRecord::from_value(value).unwrap();
        assert_eq!(record.uid.as_deref(), Some("abc"));
        assert_eq!(record.avatar_url, "https://img/a.png");
        assert!(record.friends.is_empty());
        assert!(record.requests_received.is_empty());
        assert_eq!(record.requests_sent.len(), 1);
        assert_eq!(
            record.requests_sent[&key("u2")].status,
            Some(RequestStatus::Pending)
        );
    }

    #[test]
    fn decode_record_without_mappings() {
        let record = UserRecord::from_value(json!({ "email": "bob@x.com" })).unwrap();
        assert_eq!(record.email.as_str(), "bob@x.com");
        assert!(record.friends.is_empty());
        assert!(record.requests_sent.is_empty());
    }

    #[test]
    fn decode_record_with_both_avatar_fields() {
        let value = json!({
            "email": "bob@x.com",
            "avatar": "https://img/old.png",
            "avatarUrl": "https://img/new.png",
            "friends": { "u1": { "email": "alice@x.com" } }
        });

        let record = UserRecord::from_value(value).unwrap();
        assert_eq!(record.avatar_url, "https://img/new.png");
        assert!(record.friends.contains_key(&key("u1")));

        let record =
            UserRecord::from_value(json!({ "email": "bob@x.com", "avatar": null })).unwrap();
        assert_eq!(record.avatar_url, "");
    }

    #[test]
    fn decode_unknown_request_status() {
        let value = json!({
            "email": "bob@x.com",
            "requestsReceived": { "u1": { "email": "alice@x.com", "status": "accepted" } }
        });

        let record = UserRecord::from_value(value).unwrap();
        assert_eq!(
            record.requests_received[&key("u1")].status,
            Some(RequestStatus::Unrecognized)
        );
        assert_eq!(record.status_of(&key("u1")), PeerStatus::RequestReceived);
    }

    #[test]
    fn encode_uses_camel_case() {
        let mut record = UserRecord::new(Email::parse("a@x.com").unwrap(), "img");
        record.requests_received.insert(
            key("u2"),
            RequestEntry::pending(Email::parse("b@x.com").unwrap()),
        );
        let value = record.to_value().unwrap();
        assert_eq!(value["avatarUrl"], json!("img"));
        assert_eq!(
            value["requestsReceived"]["u2"],
            json!({ "email": "b@x.com", "status": "pending" })
        );
        assert!(value.get("uid").is_none());
    }

    #[test]
    fn status_precedence() {
        let mut record = UserRecord::default();
        let peer = key("p");
        assert_eq!(record.status_of(&peer), PeerStatus::None);

        record
            .requests_sent
            .insert(peer.clone(), RequestEntry::pending(Email::parse("p@x.com").unwrap()));
        assert_eq!(record.status_of(&peer), PeerStatus::RequestSent);

        record
            .requests_received
            .insert(peer.clone(), RequestEntry::pending(Email::parse("p@x.com").unwrap()));
        assert_eq!(record.status_of(&peer), PeerStatus::RequestReceived);

        record
            .friends
            .insert(peer.clone(), FriendEntry::new(Email::parse("p@x.com").unwrap()));
        assert_eq!(record.status_of(&peer), PeerStatus::Friends);
        assert_eq!(record.peers().count(), 3);
    }
}
