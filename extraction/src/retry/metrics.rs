//! Metrics tracking and token estimation for retry runs.

use std::time::Duration;

use crate::generate::TokenUsage;
use crate::message::Message;

/// Metrics collected during one controller run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunMetrics {
    /// Number of generation calls started.
    pub attempts: usize,
    /// Wall-clock time from the start of the run.
    pub wall_time: Duration,
    /// Estimated tokens sent, summed over every attempt's conversation.
    pub estimated_input_tokens: usize,
    /// Estimated tokens received, summed over every generated text.
    pub estimated_output_tokens: usize,
    /// Prompt tokens counted by the provider; `None` when no attempt reported usage.
    pub input_tokens: Option<u64>,
    /// Completion tokens counted by the provider; `None` when no attempt reported usage.
    pub output_tokens: Option<u64>,
}

impl RunMetrics {
    /// Adds one attempt's provider-reported usage.
    pub fn record_usage(&mut self, usage: TokenUsage) {
        *self.input_tokens.get_or_insert(0) += usage.input_tokens;
        *self.output_tokens.get_or_insert(0) += usage.output_tokens;
    }

    /// Totals for two runs executed one after the other.
    #[must_use]
    pub fn combine(&self, next: &Self) -> Self {
        Self {
            attempts: self.attempts + next.attempts,
            wall_time: self.wall_time + next.wall_time,
            estimated_input_tokens: self.estimated_input_tokens + next.estimated_input_tokens,
            estimated_output_tokens: self.estimated_output_tokens + next.estimated_output_tokens,
            input_tokens: sum_reported(self.input_tokens, next.input_tokens),
            output_tokens: sum_reported(self.output_tokens, next.output_tokens),
        }
    }
}

fn sum_reported(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
    }
}

/// Estimate token count from text using the 4-chars-per-token heuristic.
///
/// Counts chars rather than bytes and rounds up.
///
/// # Examples
///
/// ```
/// use agentkit_extraction::retry::estimate_tokens;
///
/// assert_eq!(estimate_tokens("hello"), 2);
/// assert_eq!(estimate_tokens("hello world"), 3);
/// ```
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    chars_to_tokens(text.chars().count())
}

pub(crate) const fn chars_to_tokens(chars: usize) -> usize {
    chars.div_ceil(4)
}

pub(crate) fn conversation_chars(conversation: &[Message]) -> usize {
    conversation.iter().map(|m| m.content.chars().count()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_estimate_tokens_utf8() {
        assert_eq!(estimate_tokens("你好"), 1);
        assert_eq!(estimate_tokens("hello 世界"), 2);
    }

    #[test]
    fn test_record_usage_accumulates() {
        let mut metrics = RunMetrics::default();
        assert_eq!(metrics.input_tokens, None);
        metrics.record_usage(TokenUsage {
            input_tokens: 10,
            output_tokens: 3,
        });
        metrics.record_usage(TokenUsage {
            input_tokens: 5,
            output_tokens: 1,
        });
        assert_eq!(metrics.input_tokens, Some(15));
        assert_eq!(metrics.output_tokens, Some(4));
    }

    #[test]
    fn test_combine_keeps_unreported_usage_absent() {
        let first = RunMetrics {
            attempts: 2,
            wall_time: Duration::from_millis(30),
            estimated_input_tokens: 8,
            ..RunMetrics::default()
        };
        let mut second = RunMetrics {
            attempts: 1,
            wall_time: Duration::from_millis(20),
            ..RunMetrics::default()
        };
        assert_eq!(first.combine(&second).input_tokens, None);

        second.record_usage(TokenUsage {
            input_tokens: 4,
            output_tokens: 2,
        });
        let total = first.combine(&second);
        assert_eq!(total.attempts, 3);
        assert_eq!(total.wall_time, Duration::from_millis(50));
        assert_eq!(total.estimated_input_tokens, 8);
        assert_eq!(total.input_tokens, Some(4));
        assert_eq!(total.output_tokens, Some(2));
    }

    #[test]
    fn test_conversation_chars() {
        let conversation = [Message::system("abc"), Message::user("日本")];
        assert_eq!(conversation_chars(&conversation), 5);
    }
}
