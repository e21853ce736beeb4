//! Adapter from a rig [`CompletionModel`] to the [`Generate`] capability.

use agentkit_extraction::generate::{Generate, Generation, GenerationError, TokenUsage};
use agentkit_extraction::message::Message;
use async_trait::async_trait;
use rig::completion::{CompletionError, CompletionModel, Usage};

use crate::reasoning::strip_reasoning;
use crate::utils::{choice_text, to_rig_conversation};

/// Drives any rig completion model as a [`Generate`] capability.
///
/// System turns become the preamble, the last non-system turn the prompt, and
/// everything in between the chat history.
#[derive(Clone)]
pub struct RigGenerator<M> {
    model: M,
    temperature: Option<f64>,
    max_tokens: Option<u64>,
    strip_reasoning: bool,
}

impl<M: CompletionModel> RigGenerator<M> {
    /// Wraps `model` with provider defaults for sampling.
    #[must_use]
    pub const fn new(model: M) -> Self {
        Self {
            model,
            temperature: None,
            max_tokens: None,
            strip_reasoning: false,
        }
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the completion token limit.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: Option<u64>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Removes `<think>` blocks from the generated text.
    #[must_use]
    pub const fn with_strip_reasoning(mut self, strip: bool) -> Self {
        self.strip_reasoning = strip;
        self
    }

    /// The wrapped model.
    #[must_use]
    pub const fn model(&self) -> &M {
        &self.model
    }
}

#[async_trait]
impl<M> Generate for RigGenerator<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    async fn generate(&self, conversation: &[Message]) -> Result<String, GenerationError> {
        Ok(self.generate_with_usage(conversation).await?.text)
    }

    async fn generate_with_usage(&self, conversation: &[Message]) -> Result<Generation, GenerationError> {
        let rig = to_rig_conversation(conversation).ok_or_else(|| {
            GenerationError::Provider("conversation has no user or assistant turn".to_string())
        })?;

        let mut request = self.model.completion_request(rig.prompt).messages(rig.history);
        if let Some(preamble) = rig.preamble {
            request = request.preamble(preamble);
        }
        if let Some(temperature) = self.temperature {
            request = request.temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.max_tokens(max_tokens);
        }

        let response = request.send().await.map_err(|e| map_completion_error(&e))?;
        let text = choice_text(&response.choice);
        let usage = reported_usage(&response.usage);

        tracing::debug!(
            event = "generation_completed",
            turns = conversation.len(),
            response_chars = text.chars().count(),
            input_tokens = usage.map(|u| u.input_tokens),
            output_tokens = usage.map(|u| u.output_tokens),
        );

        let text = if self.strip_reasoning {
            strip_reasoning(&text)
        } else {
            text
        };
        Ok(Generation { text, usage })
    }
}

/// Providers that do not report usage leave rig's counters at zero.
const fn reported_usage(usage: &Usage) -> Option<TokenUsage> {
    if usage.input_tokens == 0 && usage.output_tokens == 0 {
        None
    } else {
        Some(TokenUsage {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        })
    }
}

fn map_completion_error(error: &CompletionError) -> GenerationError {
    let message = error.to_string();
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("429") || lowered.contains("rate limit") {
        GenerationError::RateLimited(message)
    } else if lowered.contains("connect") || lowered.contains("timed out") || lowered.contains("dns") {
        GenerationError::Unavailable(message)
    } else {
        GenerationError::Provider(message)
    }
}
