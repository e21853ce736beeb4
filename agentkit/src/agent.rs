//! Retry-wrapped agents.

use agentkit_extraction::extract::{Extracted, SchemaDescriptor};
use agentkit_extraction::generate::Generate;
use agentkit_extraction::message::{Message, Role};
use agentkit_extraction::retry::{RetryingGenerationController, RunResult, RunSuccess};
use agentkit_provider::{ModelSettings, PromptTemplate, build_generator};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use crate::config::AgentConfig;
use crate::errors::Error;
use crate::response::AgentResponse;

/// An agent that prepends its system prompt to every call and retries until the
/// model's answer is acceptable.
///
/// Structured agents (the default) require a fenced JSON block in the answer,
/// validated against the schema when one is set. Plain agents only retry failed
/// generation calls.
///
/// With a [formatter](StructuredAgentBuilder::formatter) the work is split: the
/// main model answers freely, then the formatter model turns that answer into
/// the structured value. Each model has its own attempt budget.
///
/// # Example
///
/// ```
/// use agentkit::prelude::*;
///
/// # async fn example() -> Result<(), agentkit::Error> {
/// let generator = from_fn(|_conversation: Vec<Message>| async {
///     Ok("```json\n{\"sentiment\": \"positive\"}\n```".to_string())
/// });
/// let agent = StructuredAgent::builder(generator)
///     .system_prompt("Classify the sentiment. Answer in a ```json block.")
///     .build();
///
/// let response = agent.respond(&[Message::user("I love it")]).await?;
/// assert_eq!(response.structured.unwrap()["sentiment"], "positive");
/// # Ok(())
/// # }
/// ```
pub struct StructuredAgent<G> {
    controller: RetryingGenerationController<G>,
    system: Option<Message>,
    structured: bool,
    formatter: Option<Formatter>,
}

/// Second model that converts free-form answers into structured output.
struct Formatter {
    controller: RetryingGenerationController<Box<dyn Generate>>,
    system: Message,
}

impl<G: Generate> StructuredAgent<G> {
    /// Starts building an agent around `generator`.
    #[must_use]
    pub fn builder(generator: G) -> StructuredAgentBuilder<G> {
        StructuredAgentBuilder {
            generator,
            system: None,
            config: AgentConfig::default(),
            schema: None,
            structured: true,
            formatter: None,
        }
    }

    /// The system message prepended to every call.
    #[must_use]
    pub const fn system_message(&self) -> Option<&Message> {
        self.system.as_ref()
    }

    /// Whether the agent extracts structured output.
    #[must_use]
    pub const fn is_structured(&self) -> bool {
        self.structured
    }

    /// Whether structured output comes from a separate formatter model.
    #[must_use]
    pub const fn has_formatter(&self) -> bool {
        self.formatter.is_some()
    }

    /// Answers the conversation `history`.
    ///
    /// System turns in `history` are dropped in favor of the agent's own system
    /// message; `history` itself is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Run`] when the attempt budget is spent, or
    /// [`Error::Formatter`] when the formatter model's budget is.
    pub async fn respond(&self, history: &[Message]) -> Result<AgentResponse, Error> {
        self.respond_inner(history, None).await
    }

    /// Like [`respond`](Self::respond), stopping early when `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Run`] holding [`RunFailure::Cancelled`](agentkit_extraction::retry::RunFailure::Cancelled)
    /// on cancellation, otherwise as [`respond`](Self::respond).
    pub async fn respond_with_cancel(
        &self,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<AgentResponse, Error> {
        self.respond_inner(history, Some(cancel)).await
    }

    /// Answers `history` and deserializes the structured output into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for plain agents, [`Error::Deserialize`] when the
    /// value does not fit `T`, otherwise as [`respond`](Self::respond).
    pub async fn respond_as<T: DeserializeOwned>(&self, history: &[Message]) -> Result<T, Error> {
        if !self.structured {
            return Err(Error::Config(
                "respond_as requires a structured agent".to_string(),
            ));
        }
        let response = self.respond(history).await?;
        let value = response.structured.unwrap_or_default();
        Ok(serde_json::from_value(value)?)
    }

    async fn respond_inner(
        &self,
        history: &[Message],
        cancel: Option<&CancellationToken>,
    ) -> Result<AgentResponse, Error> {
        let conversation = self.conversation(history);

        if let Some(formatter) = &self.formatter {
            let answer = match cancel {
                Some(token) => self.controller.run_text_with_cancel(&conversation, token).await?,
                None => self.controller.run_text(&conversation).await?,
            };
            let formatted = formatter
                .format(&answer.value, cancel)
                .await
                .map_err(Error::Formatter)?;
            tracing::debug!(
                event = "answer_formatted",
                main_attempts = answer.attempts,
                formatter_attempts = formatted.attempts,
            );
            let metrics = answer.metrics.combine(&formatted.metrics);
            let mut response = into_response(answer, |_| None);
            response.structured = Some(formatted.value.into_value());
            response.formatter_attempts = Some(formatted.attempts);
            response.metrics = metrics;
            Ok(response)
        } else if self.structured {
            let success = match cancel {
                Some(token) => self.controller.run_with_cancel(&conversation, token).await?,
                None => self.controller.run(&conversation).await?,
            };
            Ok(into_response(success, |value| Some(value.into_value())))
        } else {
            let success = match cancel {
                Some(token) => self.controller.run_text_with_cancel(&conversation, token).await?,
                None => self.controller.run_text(&conversation).await?,
            };
            Ok(into_response(success, |_| None))
        }
    }

    fn conversation(&self, history: &[Message]) -> Vec<Message> {
        self.system
            .iter()
            .cloned()
            .chain(history.iter().filter(|m| m.role != Role::System).cloned())
            .collect()
    }
}

impl Formatter {
    async fn format(
        &self,
        answer: &str,
        cancel: Option<&CancellationToken>,
    ) -> RunResult<Extracted> {
        let conversation = [self.system.clone(), Message::user(answer)];
        match cancel {
            Some(token) => self.controller.run_with_cancel(&conversation, token).await,
            None => self.controller.run(&conversation).await,
        }
    }
}

fn into_response<T>(
    success: RunSuccess<T>,
    structured: impl FnOnce(T) -> Option<serde_json::Value>,
) -> AgentResponse {
    let RunSuccess {
        value,
        mut conversation,
        attempts,
        metrics,
    } = success;
    let message = conversation
        .pop()
        .unwrap_or_else(|| Message::assistant(String::new()));
    AgentResponse {
        message,
        structured: structured(value),
        attempts,
        formatter_attempts: None,
        metrics,
    }
}

impl StructuredAgent<Box<dyn Generate>> {
    /// Starts building an agent for the provider and model in `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] when the provider's credential is missing.
    pub fn from_settings(
        settings: &ModelSettings,
    ) -> Result<StructuredAgentBuilder<Box<dyn Generate>>, Error> {
        Ok(Self::builder(build_generator(settings)?))
    }
}

/// Builder for [`StructuredAgent`].
pub struct StructuredAgentBuilder<G> {
    generator: G,
    system: Option<String>,
    config: AgentConfig,
    schema: Option<SchemaDescriptor>,
    structured: bool,
    formatter: Option<(Box<dyn Generate>, String, usize)>,
}

impl<G: Generate> StructuredAgentBuilder<G> {
    /// Sets the system prompt.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system = Some(prompt.into());
        self
    }

    /// Renders `template` with `vars` as the system prompt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Template`] when a placeholder is unbound.
    pub fn system_template(
        mut self,
        template: &PromptTemplate,
        vars: &HashMap<String, String>,
    ) -> Result<Self, Error> {
        self.system = Some(template.render(vars)?);
        Ok(self)
    }

    /// Sets retry and extraction settings.
    #[must_use]
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates structured output against `schema`.
    #[must_use]
    pub fn schema(mut self, schema: SchemaDescriptor) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Validates structured output against the schema derived from `T`.
    #[must_use]
    pub fn schema_for<T: JsonSchema>(self) -> Self {
        self.schema(SchemaDescriptor::for_type::<T>())
    }

    /// Whether answers must carry structured output (default: true).
    #[must_use]
    pub const fn structured(mut self, structured: bool) -> Self {
        self.structured = structured;
        self
    }

    /// Hands structured output to a second model.
    ///
    /// The main model then answers in free text, retried only on generation
    /// failures. `generator` receives `system_prompt` plus that answer as the user
    /// turn and must reply with the fenced JSON block, within its own budget of
    /// `max_attempts`. Timeout, feedback and decode settings are shared with the
    /// main model. Setting a formatter makes the agent structured.
    #[must_use]
    pub fn formatter<F: Generate + 'static>(
        mut self,
        generator: F,
        system_prompt: impl Into<String>,
        max_attempts: usize,
    ) -> Self {
        self.formatter = Some((Box::new(generator), system_prompt.into(), max_attempts));
        self.structured = true;
        self
    }

    /// Builds the agent.
    #[must_use]
    pub fn build(self) -> StructuredAgent<G> {
        let retry = self.config.retry_config();
        let formatter = self.formatter.map(|(generator, system, max_attempts)| Formatter {
            controller: RetryingGenerationController::with_config(
                generator,
                self.config.extract_config(self.schema.clone()),
                retry.clone().with_max_attempts(max_attempts),
            ),
            system: Message::system(system),
        });
        let extract = self.config.extract_config(self.schema);
        let controller = RetryingGenerationController::with_config(self.generator, extract, retry);
        tracing::debug!(
            event = "agent_built",
            structured = self.structured,
            max_attempts = self.config.max_attempts,
            has_schema = controller.extract_config().schema.is_some(),
            formatter_attempts = formatter.as_ref().map(|f| f.controller.config().max_attempts),
        );
        StructuredAgent {
            controller,
            system: self.system.map(Message::system),
            structured: self.structured,
            formatter,
        }
    }
}
