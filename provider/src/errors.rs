use std::path::PathBuf;
use thiserror::Error;

/// Errors relating to provider configuration and setup.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider tag is not one of the supported providers.
    #[error("Unknown provider '{0}' (expected one of: openai, gemini, anthropic, deepseek, ollama)")]
    UnknownProvider(String),

    /// A required credential or endpoint variable is not set.
    #[error("{var} must be set to use the {provider} provider")]
    MissingCredential {
        /// Provider tag.
        provider: String,
        /// Name of the missing environment variable.
        var: String,
    },

    /// A setting could not be parsed.
    #[error("Invalid value for {name}: {message}")]
    InvalidSetting {
        /// Setting or environment variable name.
        name: String,
        /// What was wrong with it.
        message: String,
    },

    /// Error loading the `.env` file.
    #[error("Failed to load .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
}

/// Errors relating to prompt templates.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template file could not be read.
    #[error("Failed to read template {}: {source}", path.display())]
    Io {
        /// Template path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Placeholders were left without a value.
    #[error("Unbound template variables: {}", .0.join(", "))]
    Unbound(Vec<String>),
}
