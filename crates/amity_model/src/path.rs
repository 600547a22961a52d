//! Paths into the shared tree store.

use crate::error::{ModelError, ModelResult};
use crate::identity::UserKey;
use crate::record::Mapping;
use std::fmt;

/// Characters that may not appear in a path segment.
const RESERVED: &[char] = &['.', '#', '$', '[', ']', '/'];

/// Validates a single path segment.
pub fn validate_segment(segment: &str) -> ModelResult<()> {
    if segment.is_empty() {
        return Err(ModelError::InvalidSegment {
            segment: segment.to_string(),
            reason: "segment is empty",
        });
    }
    if segment.contains(RESERVED) {
        return Err(ModelError::InvalidSegment {
            segment: segment.to_string(),
            reason: "contains a reserved character",
        });
    }
    if segment.chars().any(char::is_control) {
        return Err(ModelError::InvalidSegment {
            segment: segment.to_string(),
            reason: "contains a control character",
        });
    }
    Ok(())
}

/// An absolute path in the tree store, e.g. `users/u1/friends`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// Returns the root path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a `/`-separated path. Empty segments are skipped.
    pub fn parse(path: &str) -> ModelResult<Self> {
        let mut segments = Vec::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            validate_segment(segment)?;
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Returns a child path.
    pub fn child(&self, segment: &str) -> ModelResult<Self> {
        validate_segment(segment)?;
        Ok(self.push_unchecked(segment))
    }

    /// Returns the child path for a user key.
    pub fn key(&self, key: &UserKey) -> Self {
        self.push_unchecked(key.as_str())
    }

    /// Returns the child path for a relationship mapping.
    pub fn mapping(&self, mapping: Mapping) -> Self {
        self.push_unchecked(mapping.field_name())
    }

    fn push_unchecked(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }

    /// Returns the parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            segments: rest.to_vec(),
        })
    }

    /// Returns the path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the last segment.
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Returns true if `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &StorePath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Returns true for the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns true for the root path.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
