//! Public error types for agentkit.

use agentkit_extraction::extract::SchemaError;
use agentkit_extraction::retry::RunFailure;
use agentkit_provider::{ProviderError, TemplateError};
use thiserror::Error;

/// Errors returned by agents.
///
/// A model that never produced valid structured output is reported as
/// [`Error::Run`], carrying the full attempt history.
#[derive(Debug, Error)]
pub enum Error {
    /// The retry budget was spent or the run was cancelled.
    #[error(transparent)]
    Run(#[from] RunFailure),

    /// The formatter model's retry budget was spent or its run was cancelled.
    ///
    /// The main model answered; only the conversion to structured output failed.
    #[error("Formatter failed: {0}")]
    Formatter(RunFailure),

    /// Provider configuration or construction failed.
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// The system prompt template could not be loaded or rendered.
    #[error("{0}")]
    Template(#[from] TemplateError),

    /// The schema does not compile.
    #[error("{0}")]
    Schema(#[from] SchemaError),

    /// Structured output did not deserialize into the requested type.
    #[error("Failed to deserialize structured output: {0}")]
    Deserialize(#[from] serde_json::Error),

    /// Configuration error (invalid settings or options).
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether a model was reachable but never produced acceptable output.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(
            self,
            Self::Run(RunFailure::Exhausted { .. }) | Self::Formatter(RunFailure::Exhausted { .. })
        )
    }
}
