//! Configuration for the retry loop.

use std::time::Duration;

/// What the controller adds to the conversation after a failed extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedbackPolicy {
    /// Regenerate from the identical conversation.
    #[default]
    None,
    /// Append the failed assistant turn and a user message describing the problem.
    AppendHint,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, generation and extraction failures combined (default: 3).
    pub max_attempts: usize,
    /// Time limit for a single generation call (default: none).
    pub attempt_timeout: Option<Duration>,
    /// Feedback injected between attempts (default: [`FeedbackPolicy::None`]).
    pub feedback: FeedbackPolicy,
    /// Whether hints carry the expected schema (default: true).
    pub include_schema_in_feedback: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: None,
            feedback: FeedbackPolicy::None,
            include_schema_in_feedback: true,
        }
    }
}

impl RetryConfig {
    /// Set the maximum number of attempts. Values below 1 are raised to 1.
    #[must_use]
    pub fn with_max_attempts(mut self, max: usize) -> Self {
        self.max_attempts = max.max(1);
        self
    }

    /// Set the per-attempt generation timeout.
    #[must_use]
    pub const fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Set the feedback policy.
    #[must_use]
    pub const fn with_feedback(mut self, feedback: FeedbackPolicy) -> Self {
        self.feedback = feedback;
        self
    }

    /// Set whether to include the schema in feedback hints.
    #[must_use]
    pub const fn with_schema_in_feedback(mut self, include: bool) -> Self {
        self.include_schema_in_feedback = include;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert!(config.attempt_timeout.is_none());
        assert_eq!(config.feedback, FeedbackPolicy::None);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryConfig::default().with_max_attempts(0).max_attempts, 1);
    }
}
