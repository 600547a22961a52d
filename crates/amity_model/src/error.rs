//! Error types for the data model.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while building or decoding model values.
#[derive(Error, Debug)]
pub enum ModelError {
    /// A store path segment is empty or contains a reserved character.
    #[error("invalid path segment {segment:?}: {reason}")]
    InvalidSegment {
        /// The rejected segment.
        segment: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// An email address failed validation.
    #[error("invalid email address {0:?}")]
    InvalidEmail(String),

    /// A stored value could not be decoded into a model type.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ModelError::InvalidSegment {
            segment: "a.b".into(),
            reason: "contains a reserved character",
        };
        assert!(err.to_string().contains("a.b"));

        let err = ModelError::InvalidEmail("nobody".into());
        assert_eq!(err.to_string(), "invalid email address \"nobody\"");
    }
}
