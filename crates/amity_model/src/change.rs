//! Change events delivered by store subscriptions.

use crate::error::ModelResult;
use crate::identity::UserKey;
use crate::record::UserRecord;
use serde_json::Value;

/// Type of change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// Child existed when the subscription started, or was created later.
    Added,
    /// Child was mutated.
    Changed,
    /// Child was removed.
    Removed,
}

/// A single change event for one child of a subscribed collection.
///
/// The value is the complete child at the time of the change, never a diff.
/// Events for the same child arrive in mutation order; events for different
/// children carry no ordering guarantee.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Store-wide sequence number of the mutation.
    pub sequence: u64,
    /// Type of change.
    pub change_type: ChangeType,
    /// Key of the child within the collection.
    pub key: String,
    /// Full child value after the change (`Null` for removals).
    pub value: Value,
}

impl ChangeEvent {
    /// Creates an added event.
    pub fn added(sequence: u64, key: impl Into<String>, value: Value) -> Self {
        Self {
            sequence,
            change_type: ChangeType::Added,
            key: key.into(),
            value,
        }
    }

    /// Creates a changed event.
    pub fn changed(sequence: u64, key: impl Into<String>, value: Value) -> Self {
        Self {
            sequence,
            change_type: ChangeType::Changed,
            key: key.into(),
            value,
        }
    }

    /// Creates a removed event.
    pub fn removed(sequence: u64, key: impl Into<String>) -> Self {
        Self {
            sequence,
            change_type: ChangeType::Removed,
            key: key.into(),
            value: Value::Null,
        }
    }

    /// Decodes the event as a user record event.
    pub fn decode_user(&self) -> ModelResult<UserEvent> {
        let key = UserKey::new(self.key.clone())?;
        let record = match self.change_type {
            ChangeType::Removed => None,
            ChangeType::Added | ChangeType::Changed => {
                Some(UserRecord::from_value(self.value.clone())?)
            }
        };
        Ok(UserEvent {
            sequence: self.sequence,
            change_type: self.change_type,
            key,
            record,
        })
    }
}

/// A change event decoded against the users collection.
#[derive(Debug, Clone, PartialEq)]
pub struct UserEvent {
    /// Store-wide sequence number of the mutation.
    pub sequence: u64,
    /// Type of change.
    pub change_type: ChangeType,
    /// Key of the user record.
    pub key: UserKey,
    /// The record after the change; `None` for removals.
    pub record: Option<UserRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_added_event() {
        let event = ChangeEvent::added(3, "u1", json!({ "email": "alice@x.com" }));
        let decoded = event.decode_user().unwrap();
        assert_eq!(decoded.key.as_str(), "u1");
        assert_eq!(decoded.change_type, ChangeType::Added);
        assert_eq!(decoded.record.unwrap().email.as_str(), "alice@x.com");
    }

    #[test]
    fn decode_removed_event() {
        let decoded = ChangeEvent::removed(9, "u1").decode_user().unwrap();
        assert!(decoded.record.is_none());
        assert_eq!(decoded.sequence, 9);
    }

    #[test]
    fn decode_rejects_malformed_record() {
        let event = ChangeEvent::changed(1, "u1", json!({ "friends": 12 }));
        assert!(event.decode_user().is_err());
    }
}
