//! Hint messages appended between attempts under [`FeedbackPolicy::AppendHint`].
//!
//! [`FeedbackPolicy::AppendHint`]: super::FeedbackPolicy::AppendHint

use serde_json::Value;

use crate::extract::{ExtractionFailure, FieldError};

const MAX_ECHO_CHARS: usize = 500;

/// Build the hint for a failed extraction.
///
/// Includes the attempt counter, a description of the failure, and the expected
/// schema when one is given.
///
/// # Examples
///
/// ```
/// use agentkit_extraction::extract::ExtractionFailure;
/// use agentkit_extraction::retry::build_extraction_feedback;
///
/// let failure = ExtractionFailure::NoCandidateFound { found: 0, index: -1 };
/// let hint = build_extraction_feedback(&failure, 1, 3, None);
/// assert!(hint.contains("Attempt 1/3"));
/// assert!(hint.contains("```json"));
/// ```
#[must_use]
pub fn build_extraction_feedback(
    failure: &ExtractionFailure,
    attempt: usize,
    max_attempts: usize,
    schema: Option<&Value>,
) -> String {
    let mut feedback = match failure {
        ExtractionFailure::NoCandidateFound { .. } => format!(
            "Attempt {attempt}/{max_attempts}: Your response did not contain a ```json fenced block."
        ),
        ExtractionFailure::DecodeError {
            message, candidate, ..
        } => build_decode_feedback(candidate, message, attempt, max_attempts),
        ExtractionFailure::SchemaMismatch { errors, value } => {
            build_validation_feedback(value, errors, attempt, max_attempts)
        }
    };

    if let Some(schema) = schema {
        feedback.push_str("\n\nExpected schema:\n");
        let schema_str = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
        feedback.push_str(&schema_str);
    }

    feedback.push_str("\n\nRespond again with the complete answer inside a single ```json fenced block.");
    feedback
}

fn build_validation_feedback(
    instance: &Value,
    errors: &[FieldError],
    attempt: usize,
    max_attempts: usize,
) -> String {
    let mut feedback = format!("Attempt {attempt}/{max_attempts}: JSON validation failed.\n\n");

    feedback.push_str("Errors:\n");
    for error in errors {
        feedback.push_str("  - ");
        feedback.push_str(&error.to_string());
        feedback.push('\n');
    }

    feedback.push_str("\nYour submission:\n");
    let instance_str = serde_json::to_string_pretty(instance).unwrap_or_else(|_| instance.to_string());
    feedback.push_str(&instance_str);
    feedback
}

fn build_decode_feedback(
    candidate: &str,
    parse_error: &str,
    attempt: usize,
    max_attempts: usize,
) -> String {
    let mut feedback =
        format!("Attempt {attempt}/{max_attempts}: Could not parse your JSON block.\n\n");

    feedback.push_str("Parse error: ");
    feedback.push_str(parse_error);
    feedback.push_str("\n\n");

    feedback.push_str(&format!("Your block (first {MAX_ECHO_CHARS} chars):\n"));
    feedback.push_str(&truncate_chars(candidate.trim(), MAX_ECHO_CHARS));
    feedback
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::DecodeStrategy;
    use serde_json::json;

    #[test]
    fn test_validation_feedback() {
        let failure = ExtractionFailure::SchemaMismatch {
            errors: vec![FieldError::new("/name", "expected string, got number")],
            value: json!({"name": 123}),
        };
        let schema = json!({"type": "object", "properties": {"name": {"type": "string"}}});

        let feedback = build_extraction_feedback(&failure, 1, 3, Some(&schema));

        assert!(feedback.contains("Attempt 1/3"));
        assert!(feedback.contains("JSON validation failed"));
        assert!(feedback.contains("At path '/name': expected string"));
        assert!(feedback.contains("Expected schema:"));
        assert!(feedback.contains("Your submission:"));
    }

    #[test]
    fn test_decode_feedback() {
        let failure = ExtractionFailure::DecodeError {
            strategy: DecodeStrategy::Strict,
            message: "expected value".to_string(),
            candidate: "{oops".to_string(),
        };

        let feedback = build_extraction_feedback(&failure, 2, 3, None);

        assert!(feedback.contains("Attempt 2/3"));
        assert!(feedback.contains("Parse error: expected value"));
        assert!(feedback.contains("{oops"));
        assert!(!feedback.contains("Expected schema"));
    }

    #[test]
    fn test_truncation_is_char_safe() {
        let long = "é".repeat(MAX_ECHO_CHARS * 2);
        let truncated = truncate_chars(&long, MAX_ECHO_CHARS);
        assert_eq!(truncated.chars().count(), MAX_ECHO_CHARS + 3);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate_chars("short", MAX_ECHO_CHARS), "short");
    }
}
