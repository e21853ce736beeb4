//! # agentkit
//!
//! Structured-output agents for rig providers.
//!
//! An agent sends a conversation to a model, looks for a fenced ```` ```json ````
//! block in the answer, decodes it (tolerating the usual model mistakes),
//! validates it against a schema and retries when any of that fails.
//!
//! ## Example
//!
//! ```no_run
//! # use agentkit::prelude::*;
//! # use serde::Deserialize;
//! # use schemars::JsonSchema;
//! #[derive(Deserialize, JsonSchema)]
//! struct Invoice {
//!     number: String,
//!     total: f64,
//! }
//!
//! # async fn example() -> Result<(), agentkit::Error> {
//! load_dotenv()?;
//! let settings = ModelSettings::from_env()?;
//! let agent = StructuredAgent::from_settings(&settings)?
//!     .system_prompt("Extract the invoice. Answer in a ```json block.")
//!     .schema_for::<Invoice>()
//!     .build();
//!
//! let _invoice: Invoice = agent.respond_as(&[Message::user("Invoice #42, total 19.99")]).await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

/// Retry-wrapped agents.
pub mod agent;

/// Shared agent configuration.
pub mod config;

/// Public error types.
pub mod errors;

/// Agent response type.
pub mod response;

/// Commonly used types and traits.
pub mod prelude;

pub use agent::{StructuredAgent, StructuredAgentBuilder};
pub use config::AgentConfig;
pub use errors::Error;
pub use response::AgentResponse;
