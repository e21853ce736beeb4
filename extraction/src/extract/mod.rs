//! Extraction of structured values from free-form model output.
//!
//! Three sequential stages, each a possible early exit:
//!
//! 1. [`locate`] - find fenced ```` ```json ```` blocks and select one
//! 2. [`decode`] - parse the selected block with a [`DecodeStrategy`]
//! 3. [`schema`] - coerce and validate against an optional [`SchemaDescriptor`]
//!
//! [`StructuredOutputExtractor`] chains the stages; failures are returned as
//! [`ExtractionFailure`] values rather than logged.

pub mod decode;
pub mod error;
pub mod extractor;
pub mod locate;
pub mod markdown;
mod repair;
pub mod schema;

pub use decode::{DecodeStrategy, decode};
pub use error::{ExtractionFailure, FieldError, SchemaError};
pub use extractor::{ExtractConfig, Extracted, ExtractionResult, StructuredOutputExtractor};
pub use locate::{Candidate, locate_candidates, select_candidate};
pub use markdown::{remove_last_block, to_json_block, to_json_block_pretty};
pub use schema::SchemaDescriptor;
