//! Bounded generate-then-extract loop.

use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::config::{FeedbackPolicy, RetryConfig};
use super::error::{AttemptFailure, AttemptRecord, RunFailure};
use super::feedback::build_extraction_feedback;
use super::metrics::{RunMetrics, chars_to_tokens, conversation_chars};
use crate::extract::{ExtractConfig, Extracted, ExtractionFailure, StructuredOutputExtractor};
use crate::generate::{Generate, Generation, GenerationError, TokenUsage};
use crate::message::Message;

/// Successful outcome of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSuccess<T = Extracted> {
    /// The extracted value (or the raw text for [`RetryingGenerationController::run_text`]).
    pub value: T,
    /// Copy of the input conversation with the successful assistant turn appended.
    ///
    /// Under [`FeedbackPolicy::AppendHint`] the intermediate failed turns and hints
    /// are included as well.
    pub conversation: Vec<Message>,
    /// Number of generation calls made, including the successful one.
    pub attempts: usize,
    /// Metrics tracked across all attempts.
    pub metrics: RunMetrics,
}

/// Result of [`RetryingGenerationController::run`].
pub type RunResult<T = Extracted> = Result<RunSuccess<T>, RunFailure>;

/// Drives repeated generation and extraction for one logical request.
///
/// Every attempt is one `generate()` call followed by one extraction. Generation
/// failures (including timeouts) and extraction failures consume the same budget
/// of `max_attempts`. Attempts are strictly sequential, and the caller's
/// conversation is never mutated: each run works on its own copy.
///
/// The controller holds no per-run state, so one instance can serve many
/// concurrent runs.
pub struct RetryingGenerationController<G> {
    generator: G,
    extractor: StructuredOutputExtractor,
    config: RetryConfig,
}

impl<G: Generate> RetryingGenerationController<G> {
    /// Creates a controller with the default [`RetryConfig`].
    #[must_use]
    pub fn new(generator: G, extract_config: ExtractConfig) -> Self {
        Self::with_config(generator, extract_config, RetryConfig::default())
    }

    /// Creates a controller with explicit retry settings.
    #[must_use]
    pub const fn with_config(generator: G, extract_config: ExtractConfig, config: RetryConfig) -> Self {
        Self {
            generator,
            extractor: StructuredOutputExtractor::with_config(extract_config),
            config,
        }
    }

    /// Sets the maximum number of attempts (fluent builder pattern).
    #[must_use]
    pub fn max_attempts(mut self, max: usize) -> Self {
        self.config.max_attempts = max.max(1);
        self
    }

    /// The retry settings.
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// The extraction settings.
    #[must_use]
    pub const fn extract_config(&self) -> &ExtractConfig {
        self.extractor.config()
    }

    /// The wrapped generation capability.
    #[must_use]
    pub const fn generator(&self) -> &G {
        &self.generator
    }

    /// Runs until a value is extracted or the budget is spent.
    ///
    /// # Errors
    ///
    /// Returns [`RunFailure::Exhausted`] or [`RunFailure::GenerationExhausted`]
    /// depending on how the final attempt failed.
    pub async fn run(&self, conversation: &[Message]) -> RunResult {
        self.drive(conversation, None, |text| self.extractor.extract(text))
            .await
    }

    /// Like [`run`](Self::run), stopping early when `cancel` fires.
    ///
    /// The token is checked before each attempt and raced against the in-flight
    /// generation call.
    ///
    /// # Errors
    ///
    /// Returns [`RunFailure::Cancelled`] on cancellation, otherwise as [`run`](Self::run).
    pub async fn run_with_cancel(
        &self,
        conversation: &[Message],
        cancel: &CancellationToken,
    ) -> RunResult {
        self.drive(conversation, Some(cancel), |text| self.extractor.extract(text))
            .await
    }

    /// Generation-only loop: retries failed generation calls and returns the first text.
    ///
    /// # Errors
    ///
    /// Returns [`RunFailure::GenerationExhausted`] when every call fails.
    pub async fn run_text(&self, conversation: &[Message]) -> RunResult<String> {
        self.drive(conversation, None, |text| Ok(text.to_string()))
            .await
    }

    /// Like [`run_text`](Self::run_text), stopping early when `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`RunFailure::Cancelled`] on cancellation, otherwise as [`run_text`](Self::run_text).
    pub async fn run_text_with_cancel(
        &self,
        conversation: &[Message],
        cancel: &CancellationToken,
    ) -> RunResult<String> {
        self.drive(conversation, Some(cancel), |text| Ok(text.to_string()))
            .await
    }

    #[tracing::instrument(
        name = "retry_run",
        skip_all,
        fields(run_id = %Uuid::new_v4(), max_attempts = self.config.max_attempts.max(1))
    )]
    async fn drive<T, F>(
        &self,
        conversation: &[Message],
        cancel: Option<&CancellationToken>,
        accept: F,
    ) -> RunResult<T>
    where
        F: Fn(&str) -> Result<T, ExtractionFailure>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut session = RetrySession::new(conversation);

        loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                tracing::info!(event = "run_cancelled", attempts = session.attempts, "Run cancelled before attempt");
                return Err(session.cancelled());
            }

            session.attempts += 1;
            let attempt = session.attempts;
            session.input_chars += conversation_chars(&session.conversation);
            tracing::debug!(event = "attempt_started", attempt, max_attempts);

            let generated = match cancel {
                Some(token) => tokio::select! {
                    biased;
                    () = token.cancelled() => None,
                    result = self.generate_once(&session.conversation) => Some(result),
                },
                None => Some(self.generate_once(&session.conversation).await),
            };
            let Some(generated) = generated else {
                tracing::info!(event = "run_cancelled", attempt, "Run cancelled during generation");
                return Err(session.cancelled());
            };

            let (failure, raw_output) = match generated {
                Err(error) => {
                    tracing::warn!(
                        event = "generation_failed",
                        attempt,
                        max_attempts,
                        error = %error,
                        "Generation call failed"
                    );
                    (AttemptFailure::Generation(error), None)
                }
                Ok(Generation { text, usage }) => {
                    session.output_chars += text.chars().count();
                    if let Some(usage) = usage {
                        session.record_usage(usage);
                    }
                    match accept(&text) {
                        Ok(value) => {
                            tracing::info!(event = "run_succeeded", attempt, max_attempts);
                            session.conversation.push(Message::assistant(text));
                            return Ok(session.succeed(value));
                        }
                        Err(failure) => {
                            tracing::warn!(
                                event = "extraction_failed",
                                attempt,
                                max_attempts,
                                kind = failure.kind(),
                                error = %failure,
                                "Extraction failed"
                            );
                            if self.config.feedback == FeedbackPolicy::AppendHint && attempt < max_attempts {
                                let hint = build_extraction_feedback(
                                    &failure,
                                    attempt,
                                    max_attempts,
                                    self.feedback_schema(),
                                );
                                session.conversation.push(Message::assistant(text.clone()));
                                session.conversation.push(Message::user(hint));
                            }
                            (AttemptFailure::Extraction(failure), Some(text))
                        }
                    }
                }
            };

            session.history.push(AttemptRecord {
                attempt_number: attempt,
                failure: failure.clone(),
                raw_output,
                elapsed: session.started.elapsed(),
            });

            if attempt >= max_attempts {
                let failure = session.exhausted(failure);
                tracing::warn!(event = "run_exhausted", attempts = attempt, kind = failure.kind(), "Retry budget spent");
                return Err(failure);
            }
        }
    }

    async fn generate_once(&self, conversation: &[Message]) -> Result<Generation, GenerationError> {
        let call = self.generator.generate_with_usage(conversation);
        match self.config.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(GenerationError::Timeout(limit))),
            None => call.await,
        }
    }

    fn feedback_schema(&self) -> Option<&Value> {
        if !self.config.include_schema_in_feedback {
            return None;
        }
        self.extractor.config().schema.as_ref().map(|s| s.as_json())
    }
}

/// Runs one request with default settings and a budget of `max_attempts`.
///
/// # Errors
///
/// See [`RetryingGenerationController::run`].
pub async fn run<G: Generate + ?Sized>(
    conversation: &[Message],
    generate: &G,
    extract_config: ExtractConfig,
    max_attempts: usize,
) -> RunResult {
    RetryingGenerationController::with_config(
        generate,
        extract_config,
        RetryConfig::default().with_max_attempts(max_attempts),
    )
    .run(conversation)
    .await
}

/// State owned by one run.
struct RetrySession {
    conversation: Vec<Message>,
    history: Vec<AttemptRecord>,
    attempts: usize,
    started: Instant,
    input_chars: usize,
    output_chars: usize,
    usage: Option<TokenUsage>,
}

impl RetrySession {
    fn new(conversation: &[Message]) -> Self {
        Self {
            conversation: conversation.to_vec(),
            history: Vec::new(),
            attempts: 0,
            started: Instant::now(),
            input_chars: 0,
            output_chars: 0,
            usage: None,
        }
    }

    fn record_usage(&mut self, usage: TokenUsage) {
        let total = self.usage.get_or_insert_with(TokenUsage::default);
        total.input_tokens += usage.input_tokens;
        total.output_tokens += usage.output_tokens;
    }

    fn metrics(&self) -> RunMetrics {
        let mut metrics = RunMetrics {
            attempts: self.attempts,
            wall_time: self.started.elapsed(),
            estimated_input_tokens: chars_to_tokens(self.input_chars),
            estimated_output_tokens: chars_to_tokens(self.output_chars),
            ..RunMetrics::default()
        };
        if let Some(usage) = self.usage {
            metrics.record_usage(usage);
        }
        metrics
    }

    fn succeed<T>(self, value: T) -> RunSuccess<T> {
        let metrics = self.metrics();
        RunSuccess {
            value,
            conversation: self.conversation,
            attempts: self.attempts,
            metrics,
        }
    }

    fn exhausted(self, last: AttemptFailure) -> RunFailure {
        let metrics = self.metrics();
        match last {
            AttemptFailure::Generation(last) => RunFailure::GenerationExhausted {
                attempts: self.attempts,
                last,
                history: self.history,
                metrics,
            },
            AttemptFailure::Extraction(last) => RunFailure::Exhausted {
                attempts: self.attempts,
                last,
                history: self.history,
                metrics,
            },
        }
    }

    fn cancelled(self) -> RunFailure {
        RunFailure::Cancelled {
            attempts: self.attempts,
            metrics: self.metrics(),
            history: self.history,
        }
    }
}
