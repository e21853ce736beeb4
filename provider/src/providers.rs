//! The closed set of supported providers and construction of their generators.

use agentkit_extraction::generate::Generate;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::CompletionModel;
use rig::providers::{anthropic, deepseek, gemini, ollama, openai};
use std::env;
use std::fmt;
use std::str::FromStr;

use crate::errors::ProviderError;
use crate::rate_limit::{RateLimitPolicy, RateLimitedGenerator};
use crate::rig_model::RigGenerator;

/// A model provider, selected at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Provider {
    /// `OpenAI` (`OPENAI_API_KEY`).
    #[default]
    OpenAi,
    /// Google Gemini (`GEMINI_API_KEY`).
    Gemini,
    /// Anthropic (`ANTHROPIC_API_KEY`).
    Anthropic,
    /// `DeepSeek` (`DEEPSEEK_API_KEY`).
    DeepSeek,
    /// A local Ollama server (`OLLAMA_API_BASE_URL`).
    Ollama,
}

impl Provider {
    /// Every supported provider.
    pub const ALL: [Self; 5] = [
        Self::OpenAi,
        Self::Gemini,
        Self::Anthropic,
        Self::DeepSeek,
        Self::Ollama,
    ];

    /// Lowercase tag used in configuration.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::Anthropic => "anthropic",
            Self::DeepSeek => "deepseek",
            Self::Ollama => "ollama",
        }
    }

    /// Environment variable the rig client reads its credential or endpoint from.
    #[must_use]
    pub const fn env_var(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::DeepSeek => "DEEPSEEK_API_KEY",
            Self::Ollama => "OLLAMA_API_BASE_URL",
        }
    }

    /// Model used when none is configured.
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Gemini => "gemini-2.5-flash",
            Self::Anthropic => "claude-sonnet-4-0",
            Self::DeepSeek => "deepseek-chat",
            Self::Ollama => "llama3.2",
        }
    }

    /// Token limit applied when none is configured; Anthropic requires one.
    #[must_use]
    pub const fn default_max_tokens(self) -> Option<u64> {
        match self {
            Self::Anthropic => Some(4096),
            _ => None,
        }
    }

    /// Account-level request budget for `model`, or `None` for local servers.
    #[must_use]
    pub fn rate_limit(self, model: &str) -> Option<RateLimitPolicy> {
        let rpm = match self {
            Self::OpenAi | Self::Anthropic | Self::DeepSeek => 60,
            Self::Gemini => match model {
                "gemini-2.5-pro" => 150,
                "gemini-2.5-flash" => 1000,
                _ => 10,
            },
            Self::Ollama => return None,
        };
        Some(RateLimitPolicy::per_minute(rpm))
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Provider {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" | "google" => Ok(Self::Gemini),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "deepseek" => Ok(Self::DeepSeek),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ProviderError::UnknownProvider(s.to_string())),
        }
    }
}

/// Which model to call and how.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    /// The provider.
    pub provider: Provider,
    /// Model identifier understood by the provider.
    pub model: String,
    /// Sampling temperature; provider default when `None`.
    pub temperature: Option<f64>,
    /// Completion token limit; provider default when `None`.
    pub max_tokens: Option<u64>,
    /// Client-side request budget; unlimited when `None`.
    pub rate_limit: Option<RateLimitPolicy>,
    /// Whether `<think>` blocks are removed from responses.
    pub strip_reasoning: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self::new(Provider::default())
    }
}

impl ModelSettings {
    /// Settings for `provider` with its default model and rate limit.
    #[must_use]
    pub fn new(provider: Provider) -> Self {
        let model = provider.default_model().to_string();
        Self {
            provider,
            rate_limit: provider.rate_limit(&model),
            model,
            temperature: None,
            max_tokens: provider.default_max_tokens(),
            strip_reasoning: true,
        }
    }

    /// Reads `AGENTKIT_PROVIDER`, `AGENTKIT_MODEL`, `AGENTKIT_TEMPERATURE` and
    /// `AGENTKIT_MAX_TOKENS` from the environment. Unset values keep their defaults.
    ///
    /// Call [`load_dotenv`] first to pick up a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] for an unknown provider or an unparsable number.
    pub fn from_env() -> Result<Self, ProviderError> {
        let provider = match read_var("AGENTKIT_PROVIDER") {
            Some(tag) => tag.parse()?,
            None => Provider::default(),
        };
        let mut settings = Self::new(provider);
        if let Some(model) = read_var("AGENTKIT_MODEL") {
            settings = settings.with_model(model);
        }
        if let Some(temperature) = parse_var::<f64>("AGENTKIT_TEMPERATURE")? {
            settings.temperature = Some(temperature);
        }
        if let Some(max_tokens) = parse_var::<u64>("AGENTKIT_MAX_TOKENS")? {
            settings.max_tokens = Some(max_tokens);
        }
        Ok(settings)
    }

    /// Switches provider, resetting model, token limit and rate limit to its defaults.
    #[must_use]
    pub fn with_provider(self, provider: Provider) -> Self {
        Self {
            temperature: self.temperature,
            strip_reasoning: self.strip_reasoning,
            ..Self::new(provider)
        }
    }

    /// Sets the model; the rate limit follows the model's quota.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self.rate_limit = self.provider.rate_limit(&self.model);
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the completion token limit.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets or clears the rate limit.
    #[must_use]
    pub const fn with_rate_limit(mut self, policy: Option<RateLimitPolicy>) -> Self {
        self.rate_limit = policy;
        self
    }

    /// Sets whether `<think>` blocks are removed from responses.
    #[must_use]
    pub const fn with_strip_reasoning(mut self, strip: bool) -> Self {
        self.strip_reasoning = strip;
        self
    }
}

/// Loads a `.env` file from the current directory or its parents, if there is one.
///
/// # Errors
///
/// Returns [`ProviderError::Dotenv`] when a `.env` file exists but cannot be parsed.
pub fn load_dotenv() -> Result<(), ProviderError> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!(event = "dotenv_loaded", path = %path.display());
            Ok(())
        }
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Builds the generator for `settings`, wrapped in a rate limiter when one is set.
///
/// # Errors
///
/// Returns [`ProviderError::MissingCredential`] when the provider's environment
/// variable is unset or empty.
pub fn build_generator(settings: &ModelSettings) -> Result<Box<dyn Generate>, ProviderError> {
    let provider = settings.provider;
    if read_var(provider.env_var()).is_none() {
        return Err(ProviderError::MissingCredential {
            provider: provider.tag().to_string(),
            var: provider.env_var().to_string(),
        });
    }

    let model = settings.model.as_str();
    let generator = match provider {
        Provider::OpenAi => rig_generator(openai::Client::from_env().completion_model(model), settings),
        Provider::Gemini => rig_generator(gemini::Client::from_env().completion_model(model), settings),
        Provider::Anthropic => {
            rig_generator(anthropic::Client::from_env().completion_model(model), settings)
        }
        Provider::DeepSeek => {
            rig_generator(deepseek::Client::from_env().completion_model(model), settings)
        }
        Provider::Ollama => rig_generator(ollama::Client::from_env().completion_model(model), settings),
    };

    tracing::info!(
        event = "generator_built",
        provider = %provider,
        model = %settings.model,
        rate_limited = settings.rate_limit.is_some(),
    );

    Ok(match settings.rate_limit {
        Some(policy) => Box::new(RateLimitedGenerator::new(generator, policy)),
        None => generator,
    })
}

fn rig_generator<M>(model: M, settings: &ModelSettings) -> Box<dyn Generate>
where
    M: CompletionModel + Send + Sync + 'static,
{
    Box::new(
        RigGenerator::new(model)
            .with_temperature(settings.temperature)
            .with_max_tokens(settings.max_tokens)
            .with_strip_reasoning(settings.strip_reasoning),
    )
}

fn read_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, ProviderError>
where
    T::Err: fmt::Display,
{
    read_var(name)
        .map(|raw| {
            raw.trim().parse().map_err(|e: T::Err| ProviderError::InvalidSetting {
                name: name.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}
