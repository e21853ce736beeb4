//! The generation capability consumed by the retry controller.
//!
//! Anything that can turn a conversation into text implements [`Generate`]: a rig
//! completion model, a rate-limited wrapper, or a plain async closure via [`from_fn`].

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::message::Message;

/// Failure of a single generation call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The provider returned an error response.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The call did not complete within the per-attempt time limit.
    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    /// The provider rejected the call because of rate limits.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The provider could not be reached.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl GenerationError {
    /// Whether the failure is transient and likely to clear on its own.
    ///
    /// The retry controller counts every failure against the same budget; this is
    /// informational for callers deciding whether to escalate.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::RateLimited(_) | Self::Unavailable(_)
        )
    }
}

/// Token counts reported by the provider for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input_tokens: u64,
    /// Completion tokens.
    pub output_tokens: u64,
}

/// Text of one generation call plus the provider's usage report, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// The generated assistant turn.
    pub text: String,
    /// Counted usage; `None` when the backend does not report it.
    pub usage: Option<TokenUsage>,
}

impl Generation {
    /// A generation without a usage report.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }

    /// Attaches a usage report.
    #[must_use]
    pub const fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// A capability that produces new text from an ordered conversation.
///
/// Implementations must be safe to call repeatedly with the same input.
/// Backends that know what the provider counted override
/// [`generate_with_usage`](Self::generate_with_usage); the retry controller
/// always calls that method.
#[async_trait]
pub trait Generate: Send + Sync {
    /// Generates the next assistant turn for `conversation`.
    async fn generate(&self, conversation: &[Message]) -> Result<String, GenerationError>;

    /// Like [`generate`](Self::generate), also returning the provider's token usage.
    async fn generate_with_usage(&self, conversation: &[Message]) -> Result<Generation, GenerationError> {
        self.generate(conversation).await.map(Generation::text)
    }
}

#[async_trait]
impl<G: Generate + ?Sized> Generate for Box<G> {
    async fn generate(&self, conversation: &[Message]) -> Result<String, GenerationError> {
        (**self).generate(conversation).await
    }

    async fn generate_with_usage(&self, conversation: &[Message]) -> Result<Generation, GenerationError> {
        (**self).generate_with_usage(conversation).await
    }
}

#[async_trait]
impl<G: Generate + ?Sized> Generate for &G {
    async fn generate(&self, conversation: &[Message]) -> Result<String, GenerationError> {
        (**self).generate(conversation).await
    }

    async fn generate_with_usage(&self, conversation: &[Message]) -> Result<Generation, GenerationError> {
        (**self).generate_with_usage(conversation).await
    }
}

#[async_trait]
impl<G: Generate + ?Sized> Generate for Arc<G> {
    async fn generate(&self, conversation: &[Message]) -> Result<String, GenerationError> {
        (**self).generate(conversation).await
    }

    async fn generate_with_usage(&self, conversation: &[Message]) -> Result<Generation, GenerationError> {
        (**self).generate_with_usage(conversation).await
    }
}

/// [`Generate`] implementation backed by an async closure. See [`from_fn`].
#[derive(Clone)]
pub struct FnGenerator<F> {
    f: F,
}

/// Wraps an async closure taking the conversation by value as a [`Generate`] capability.
///
/// ```
/// use agentkit_extraction::generate::{from_fn, Generate, GenerationError};
/// use agentkit_extraction::message::Message;
///
/// # async fn example() {
/// let echo = from_fn(|conversation: Vec<Message>| async move {
///     Ok::<_, GenerationError>(format!("{} turns", conversation.len()))
/// });
/// let text = echo.generate(&[Message::user("hi")]).await.unwrap();
/// assert_eq!(text, "1 turns");
/// # }
/// ```
pub const fn from_fn<F, Fut>(f: F) -> FnGenerator<F>
where
    F: Fn(Vec<Message>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, GenerationError>> + Send + 'static,
{
    FnGenerator { f }
}

#[async_trait]
impl<F, Fut> Generate for FnGenerator<F>
where
    F: Fn(Vec<Message>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, GenerationError>> + Send + 'static,
{
    async fn generate(&self, conversation: &[Message]) -> Result<String, GenerationError> {
        (self.f)(conversation.to_vec()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_boxed_and_shared_generators_delegate() {
        let generator = from_fn(|conversation: Vec<Message>| async move {
            Ok(conversation
                .last()
                .map(|m| m.content.to_uppercase())
                .unwrap_or_default())
        });
        let boxed: Box<dyn Generate> = Box::new(generator);
        let shared = Arc::new(boxed);

        let text = shared.generate(&[Message::user("ping")]).await.unwrap();
        assert_eq!(text, "PING");
    }

    struct Counted;

    #[async_trait]
    impl Generate for Counted {
        async fn generate(&self, conversation: &[Message]) -> Result<String, GenerationError> {
            Ok(self.generate_with_usage(conversation).await?.text)
        }

        async fn generate_with_usage(&self, _conversation: &[Message]) -> Result<Generation, GenerationError> {
            Ok(Generation::text("ok").with_usage(TokenUsage {
                input_tokens: 7,
                output_tokens: 2,
            }))
        }
    }

    #[tokio::test]
    async fn test_usage_defaults_to_unreported() {
        let generator = from_fn(|_conversation: Vec<Message>| async { Ok("x".to_string()) });
        let generation = generator.generate_with_usage(&[Message::user("q")]).await.unwrap();
        assert_eq!(generation, Generation::text("x"));
    }

    #[tokio::test]
    async fn test_usage_survives_boxing() {
        let boxed: Box<dyn Generate> = Box::new(Counted);
        let generation = Arc::new(boxed).generate_with_usage(&[Message::user("q")]).await.unwrap();
        assert_eq!(generation.usage.map(|u| u.input_tokens), Some(7));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(GenerationError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(GenerationError::RateLimited("429".into()).is_retryable());
        assert!(!GenerationError::Provider("bad request".into()).is_retryable());
    }
}
