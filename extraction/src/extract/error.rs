//! Failure kinds produced by the extraction stages.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

use super::decode::DecodeStrategy;

/// A single field-level validation problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// JSON pointer to the offending value (empty for the document root).
    pub path: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl FieldError {
    /// Creates a new field error.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "At path '{path}': {}", self.message)
    }
}

/// Why one extraction call did not yield a value.
///
/// Every variant is recoverable by asking the model again.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionFailure {
    /// No fenced JSON block exists at the requested index.
    #[error("No fenced JSON block at index {index} ({found} found)")]
    NoCandidateFound {
        /// Number of blocks located in the text.
        found: usize,
        /// The requested selection index.
        index: isize,
    },

    /// A block was located but could not be parsed.
    #[error("{strategy} decoding failed: {message}")]
    DecodeError {
        /// Strategy that was applied.
        strategy: DecodeStrategy,
        /// Parser error message.
        message: String,
        /// The offending block text.
        candidate: String,
    },

    /// The decoded value does not satisfy the schema.
    #[error("Schema validation failed with {} error(s)", .errors.len())]
    SchemaMismatch {
        /// Field-level problems.
        errors: Vec<FieldError>,
        /// The decoded value that was rejected.
        value: Value,
    },
}

impl ExtractionFailure {
    /// Short machine-friendly name of the failure kind, used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NoCandidateFound { .. } => "no_candidate_found",
            Self::DecodeError { .. } => "decode_error",
            Self::SchemaMismatch { .. } => "schema_mismatch",
        }
    }
}

/// The schema itself is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Schema error: {0}")]
pub struct SchemaError(pub String);
