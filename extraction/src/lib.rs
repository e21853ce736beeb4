//! Structured-output extraction and bounded retry for language-model agents.
//!
//! Language models are asked to answer inside a fenced ```` ```json ```` block. This crate
//! turns that free-form text into a validated value, and re-asks the model when it
//! doesn't comply:
//!
//! - [`extract`] - locate, decode and validate the JSON payload of one response
//! - [`retry`] - drive a [`Generate`](generate::Generate) capability until extraction succeeds
//! - [`generate`] - the generation capability seam and its error type
//! - [`message`] - role-tagged conversation turns

pub mod extract;
pub mod generate;
pub mod message;
pub mod retry;

/// Common traits and types for ergonomic usage of the extraction pipeline.
pub mod prelude {
    pub use crate::extract::{
        DecodeStrategy, ExtractConfig, Extracted, ExtractionFailure, ExtractionResult, FieldError,
        SchemaDescriptor, StructuredOutputExtractor,
    };
    pub use crate::generate::{Generate, Generation, GenerationError, TokenUsage, from_fn};
    pub use crate::message::{Message, Role};
    pub use crate::retry::{
        FeedbackPolicy, RetryConfig, RetryingGenerationController, RunFailure, RunMetrics,
        RunSuccess,
    };
}
