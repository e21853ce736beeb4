//! Common imports for agentkit usage.
//!
//! ```
//! use agentkit::prelude::*;
//! ```

pub use crate::agent::{StructuredAgent, StructuredAgentBuilder};
pub use crate::config::AgentConfig;
pub use crate::errors::Error;
pub use crate::response::AgentResponse;

// Extraction and retry building blocks
pub use agentkit_extraction::prelude::*;

// Provider selection
pub use agentkit_provider::{
    ModelSettings, PromptTemplate, Provider, RateLimitPolicy, load_dotenv,
};
