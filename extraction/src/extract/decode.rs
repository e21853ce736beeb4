//! Decoding a located block into a mapping or sequence.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::error::ExtractionFailure;
use super::repair;

/// How permissive the JSON parser is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeStrategy {
    /// Well-formed JSON only.
    Strict,
    /// JSON5: comments, single quotes, unquoted keys, trailing commas.
    Relaxed,
    /// Strict first, then best-effort repair of common defects such as unbalanced
    /// brackets, unterminated strings and missing quotes.
    #[default]
    Tolerant,
}

impl fmt::Display for DecodeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Relaxed => write!(f, "relaxed"),
            Self::Tolerant => write!(f, "tolerant"),
        }
    }
}

impl FromStr for DecodeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" | "json" => Ok(Self::Strict),
            "relaxed" | "json5" => Ok(Self::Relaxed),
            "tolerant" | "repair" | "json-repair" => Ok(Self::Tolerant),
            other => Err(format!(
                "unknown decode strategy '{other}' (expected strict, relaxed or tolerant)"
            )),
        }
    }
}

/// Parses `candidate` with `strategy`.
///
/// Only mappings and sequences count as structured output; a bare scalar is a
/// decode failure.
///
/// # Errors
///
/// Returns [`ExtractionFailure::DecodeError`] carrying the candidate text when
/// parsing fails or yields a scalar.
pub fn decode(candidate: &str, strategy: DecodeStrategy) -> Result<Value, ExtractionFailure> {
    let failure = |message: String| ExtractionFailure::DecodeError {
        strategy,
        message,
        candidate: candidate.to_string(),
    };

    if candidate.trim().is_empty() {
        return Err(failure("block is empty".to_string()));
    }

    let parsed = match strategy {
        DecodeStrategy::Strict => serde_json::from_str::<Value>(candidate).map_err(|e| e.to_string()),
        DecodeStrategy::Relaxed => json5::from_str::<Value>(candidate).map_err(|e| e.to_string()),
        DecodeStrategy::Tolerant => {
            serde_json::from_str::<Value>(candidate).or_else(|_| repair::parse(candidate))
        }
    };

    match parsed {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Ok(value),
        Ok(other) => Err(failure(format!(
            "expected a mapping or sequence, got {}",
            kind_of(&other)
        ))),
        Err(message) => Err(failure(message)),
    }
}

pub(crate) const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
