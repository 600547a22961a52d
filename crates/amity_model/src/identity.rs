//! Identifiers for users and sessions.

use crate::error::{ModelError, ModelResult};
use crate::path::validate_segment;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned key of a user record.
///
/// Keys are used directly as path segments and as map keys inside the
/// relationship mappings of other users.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserKey(String);

impl UserKey {
    /// Creates a user key, validating it as a path segment.
    pub fn new(key: impl Into<String>) -> ModelResult<Self> {
        let key = key.into();
        validate_segment(&key)?;
        Ok(Self(key))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UserKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An email address as stored in user records and relationship entries.
///
/// Stored values are not validated on read: the empty email marks a
/// placeholder entry. Use [`Email::parse`] for user input.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Parses and validates an email address.
    pub fn parse(email: impl Into<String>) -> ModelResult<Self> {
        let email = email.into();
        let trimmed = email.trim();
        match trimmed.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
                Ok(Self(trimmed.to_string()))
            }
            _ => Err(ModelError::InvalidEmail(email)),
        }
    }

    /// Returns the email as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the empty placeholder email.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encodes the email as a single path segment for the email index.
    ///
    /// `.` becomes `,`; `,`, `%`, control characters and the other reserved
    /// characters are percent-encoded, so distinct emails never share a slot.
    pub fn index_segment(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        for c in self.0.chars() {
            match c {
                '.' => out.push(','),
                '%' | ',' | '#' | '$' | '[' | ']' | '/' => {
                    out.push_str(&format!("%{:02X}", c as u32))
                }
                c if c.is_control() => out.push_str(&format!("%{:02X}", c as u32)),
                c => out.push(c),
            }
        }
        out
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The identity produced by authentication, before it is tied to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthIdentity {
    /// Authentication user id, if the provider supplies one.
    pub uid: Option<String>,
    /// Email of the authenticated user.
    pub email: Email,
}

impl AuthIdentity {
    /// Creates an identity from an email alone.
    pub fn new(email: Email) -> Self {
        Self { uid: None, email }
    }

    /// Sets the authentication user id.
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn user_key_rejects_reserved_characters() {
        assert!(UserKey::new("u1").is_ok());
        assert!(UserKey::new("-NxY_12").is_ok());
        assert!(UserKey::new("").is_err());
        assert!(UserKey::new("a/b").is_err());
        assert!(UserKey::new("a.b").is_err());
    }

    #[test]
    fn email_parse() {
        assert_eq!(Email::parse(" bob@x.com ").unwrap().as_str(), "bob@x.com");
        assert!(Email::parse("bob").is_err());
        assert!(Email::parse("@x.com").is_err());
        assert!(Email::parse("bob@").is_err());
    }

    #[test]
    fn placeholder_email_is_empty() {
        assert!(Email::default().is_empty());
        assert!(!Email::parse("a@b.c").unwrap().is_empty());
    }

    #[test]
    fn index_segment_is_a_valid_segment() {
        let email = Email::parse("first.last+tag@mail.example.com").unwrap();
        let segment = email.index_segment();
        assert_eq!(segment, "first,last+tag@mail,example,com");
        assert!(validate_segment(&segment).is_ok());

        let odd = Email::parse("a#b$c%d@x.io").unwrap();
        let segment = odd.index_segment();
        assert_eq!(segment, "a%23b%24c%25d@x,io");
        assert!(validate_segment(&segment).is_ok());
    }

    #[test]
    fn comma_and_dot_use_different_slots() {
        let dotted = Email::parse("a.b@x.com").unwrap();
        let comma = Email::parse("a,b@x.com").unwrap();
        assert_eq!(dotted.index_segment(), "a,b@x,com");
        assert_eq!(comma.index_segment(), "a%2Cb@x,com");
    }

    proptest! {
        #[test]
        fn index_segment_always_valid(
            local in "[a-zA-Z0-9.#$%\\[\\]/+_-]{1,16}",
            domain in "[a-z0-9.]{1,12}",
        ) {
            let email = Email::parse(format!("{local}@{domain}")).unwrap();
            prop_assert!(validate_segment(&email.index_segment()).is_ok());
        }

        #[test]
        fn index_segment_is_injective(
            a in "[a-z.,%]{1,6}@[a-z.,]{1,6}",
            b in "[a-z.,%]{1,6}@[a-z.,]{1,6}",
        ) {
            let a = Email::parse(a).unwrap();
            let b = Email::parse(b).unwrap();
            prop_assert_eq!(a == b, a.index_segment() == b.index_segment());
        }
    }

    #[test]
    fn user_key_serializes_transparently() {
        let key = UserKey::new("u1").unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"u1\"");
    }
}
