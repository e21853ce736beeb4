#![deny(missing_docs)]
//! Generation backends for agentkit.
//!
//! Turns rig completion models into the [`Generate`](agentkit_extraction::generate::Generate)
//! capability consumed by the retry controller, selected from a closed set of
//! [`Provider`]s at configuration time.

/// Error types for the provider.
pub mod errors;
/// Prompt templates.
pub mod prompts;
/// Supported providers and generator construction.
pub mod providers;
/// Client-side rate limiting.
pub mod rate_limit;
/// Reasoning-content handling.
pub mod reasoning;
/// Adapter from rig completion models.
pub mod rig_model;
/// Conversion between agentkit and rig message types.
pub mod utils;

pub use errors::{ProviderError, TemplateError};
pub use prompts::PromptTemplate;
pub use providers::{ModelSettings, Provider, build_generator, load_dotenv};
pub use rate_limit::{RateLimitPolicy, RateLimitedGenerator};
pub use reasoning::{Reasoning, split_reasoning, strip_reasoning};
pub use rig_model::RigGenerator;
