//! Shared agent configuration.

use agentkit_extraction::extract::{DecodeStrategy, ExtractConfig, SchemaDescriptor};
use agentkit_extraction::retry::{FeedbackPolicy, RetryConfig};
use std::time::Duration;

/// Retry and extraction settings shared by every call of an agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Attempt budget per call. Default: 3.
    pub max_attempts: usize,

    /// Time limit for one generation call. Default: none.
    pub attempt_timeout: Option<Duration>,

    /// Whether failed attempts are explained to the model. Default: [`FeedbackPolicy::None`].
    pub feedback: FeedbackPolicy,

    /// Whether feedback hints repeat the expected schema. Default: true.
    pub schema_in_feedback: bool,

    /// Which fenced block to extract; negative counts from the end. Default: -1.
    pub selection_index: isize,

    /// JSON decode strategy. Default: [`DecodeStrategy::Tolerant`].
    pub strategy: DecodeStrategy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: None,
            feedback: FeedbackPolicy::None,
            schema_in_feedback: true,
            selection_index: -1,
            strategy: DecodeStrategy::Tolerant,
        }
    }
}

impl AgentConfig {
    /// Create a new `AgentConfig` with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the attempt budget (at least 1).
    #[must_use]
    pub fn max_attempts(mut self, max: usize) -> Self {
        self.max_attempts = max.max(1);
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub const fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Sets the feedback policy.
    #[must_use]
    pub const fn feedback(mut self, feedback: FeedbackPolicy) -> Self {
        self.feedback = feedback;
        self
    }

    /// Sets whether feedback hints include the expected schema.
    #[must_use]
    pub const fn schema_in_feedback(mut self, include: bool) -> Self {
        self.schema_in_feedback = include;
        self
    }

    /// Sets the block selection index.
    #[must_use]
    pub const fn selection_index(mut self, index: isize) -> Self {
        self.selection_index = index;
        self
    }

    /// Sets the decode strategy.
    #[must_use]
    pub const fn strategy(mut self, strategy: DecodeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub(crate) fn retry_config(&self) -> RetryConfig {
        let config = RetryConfig::default()
            .with_max_attempts(self.max_attempts)
            .with_feedback(self.feedback)
            .with_schema_in_feedback(self.schema_in_feedback);
        match self.attempt_timeout {
            Some(timeout) => config.with_attempt_timeout(timeout),
            None => config,
        }
    }

    pub(crate) fn extract_config(&self, schema: Option<SchemaDescriptor>) -> ExtractConfig {
        let config = ExtractConfig::default()
            .selection_index(self.selection_index)
            .strategy(self.strategy);
        match schema {
            Some(schema) => config.schema(schema),
            None => config,
        }
    }
}
