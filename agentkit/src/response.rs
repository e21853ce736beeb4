//! Shared response type for agent calls.

use agentkit_extraction::message::Message;
use agentkit_extraction::retry::RunMetrics;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Reply of one agent call.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentResponse {
    /// The assistant turn that was accepted.
    pub message: Message,
    /// The extracted value, for structured agents.
    pub structured: Option<Value>,
    /// Generation calls made by the main model, including the successful one.
    pub attempts: usize,
    /// Calls made by the formatter model, when the agent has one.
    pub formatter_attempts: Option<usize>,
    /// Token and timing metrics for the call, summed over both models.
    pub metrics: RunMetrics,
}

impl AgentResponse {
    /// The assistant's raw text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.message.content
    }

    /// Deserializes the structured value into `T`.
    ///
    /// Returns `None` for plain-text agents.
    ///
    /// # Errors
    ///
    /// Returns the deserialization error when the value does not fit `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Option<Result<T, serde_json::Error>> {
        self.structured.clone().map(serde_json::from_value)
    }
}
