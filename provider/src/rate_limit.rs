//! Client-side request rate limiting with `governor`.

use agentkit_extraction::generate::{Generate, Generation, GenerationError};
use agentkit_extraction::message::Message;
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Request budget for one provider account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Sustained requests per minute allowed for the whole account.
    pub requests_per_minute: u32,
    /// Requests that may be made back to back before throttling starts.
    pub burst: u32,
    /// Number of agents sharing the account; each gets an equal share.
    pub agents: u32,
}

impl RateLimitPolicy {
    /// Policy for `requests_per_minute` with a burst of 10 and a single agent.
    #[must_use]
    pub const fn per_minute(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            burst: 10,
            agents: 1,
        }
    }

    /// Sets the burst size.
    #[must_use]
    pub const fn with_burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }

    /// Sets the number of agents sharing the account.
    #[must_use]
    pub const fn with_agents(mut self, agents: u32) -> Self {
        self.agents = agents;
        self
    }

    /// Per-agent requests per minute, never below one.
    #[must_use]
    pub fn effective_per_minute(&self) -> u32 {
        (self.requests_per_minute / self.agents.max(1)).max(1)
    }

    /// The `governor` quota for one agent.
    #[must_use]
    pub fn quota(&self) -> Quota {
        let rate = NonZeroU32::new(self.effective_per_minute()).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(self.burst).unwrap_or(NonZeroU32::MIN);
        Quota::per_minute(rate).allow_burst(burst)
    }
}

/// A generator wrapper that waits for a permit before every call.
pub struct RateLimitedGenerator<G> {
    inner: G,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl<G: Generate> RateLimitedGenerator<G> {
    /// Wraps `inner` with its own limiter.
    #[must_use]
    pub fn new(inner: G, policy: RateLimitPolicy) -> Self {
        Self {
            inner,
            limiter: Arc::new(RateLimiter::direct(policy.quota())),
        }
    }

    /// Wraps another generator with this one's limiter, so both draw from one budget.
    #[must_use]
    pub fn share<H: Generate>(&self, inner: H) -> RateLimitedGenerator<H> {
        RateLimitedGenerator {
            inner,
            limiter: Arc::clone(&self.limiter),
        }
    }

    /// Takes a permit without waiting; `false` when the budget is spent.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    async fn acquire(&self) {
        if self.limiter.check().is_err() {
            tracing::debug!(event = "rate_limit_wait", "Waiting for rate limit permit");
            self.limiter.until_ready().await;
        }
    }
}

#[async_trait]
impl<G: Generate> Generate for RateLimitedGenerator<G> {
    async fn generate(&self, conversation: &[Message]) -> Result<String, GenerationError> {
        self.acquire().await;
        self.inner.generate(conversation).await
    }

    async fn generate_with_usage(&self, conversation: &[Message]) -> Result<Generation, GenerationError> {
        self.acquire().await;
        self.inner.generate_with_usage(conversation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentkit_extraction::generate::from_fn;

    fn ok_generator() -> impl Generate {
        from_fn(|_conversation: Vec<Message>| async { Ok("ok".to_string()) })
    }

    #[test]
    fn test_effective_rate_is_split_between_agents() {
        assert_eq!(RateLimitPolicy::per_minute(60).with_agents(4).effective_per_minute(), 15);
        assert_eq!(RateLimitPolicy::per_minute(10).with_agents(50).effective_per_minute(), 1);
        assert_eq!(RateLimitPolicy::per_minute(60).with_agents(0).effective_per_minute(), 60);
    }

    #[tokio::test]
    async fn test_burst_then_throttled() {
        let limited = RateLimitedGenerator::new(ok_generator(), RateLimitPolicy::per_minute(1).with_burst(2));

        assert_eq!(limited.generate(&[Message::user("a")]).await.unwrap(), "ok");
        assert_eq!(limited.generate(&[Message::user("b")]).await.unwrap(), "ok");
        assert!(!limited.try_acquire());
    }

    struct Metered;

    #[async_trait]
    impl Generate for Metered {
        async fn generate(&self, _conversation: &[Message]) -> Result<String, GenerationError> {
            Ok("ok".to_string())
        }

        async fn generate_with_usage(&self, _conversation: &[Message]) -> Result<Generation, GenerationError> {
            Ok(Generation::text("ok").with_usage(agentkit_extraction::generate::TokenUsage {
                input_tokens: 3,
                output_tokens: 1,
            }))
        }
    }

    #[tokio::test]
    async fn test_usage_passes_through() {
        let limited = RateLimitedGenerator::new(Metered, RateLimitPolicy::per_minute(60));
        let generation = limited.generate_with_usage(&[Message::user("a")]).await.unwrap();
        assert_eq!(generation.usage.map(|u| u.input_tokens), Some(3));
    }

    #[tokio::test]
    async fn test_shared_budget() {
        let first = RateLimitedGenerator::new(ok_generator(), RateLimitPolicy::per_minute(1).with_burst(1));
        let second = first.share(ok_generator());

        second.generate(&[Message::user("a")]).await.unwrap();
        assert!(!first.try_acquire());
    }
}
