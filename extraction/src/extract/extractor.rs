//! The locate, decode and validate pipeline.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::decode::{DecodeStrategy, decode};
use super::error::{ExtractionFailure, FieldError};
use super::locate::select_candidate;
use super::schema::SchemaDescriptor;

/// A successfully extracted value.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// Decoded and conformant to the configured schema (after coercion).
    Validated(Value),
    /// Decoded without a schema to check against.
    Parsed(Value),
}

impl Extracted {
    /// Borrows the extracted value.
    #[must_use]
    pub const fn value(&self) -> &Value {
        match self {
            Self::Validated(v) | Self::Parsed(v) => v,
        }
    }

    /// Consumes the result, returning the value.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Validated(v) | Self::Parsed(v) => v,
        }
    }

    /// Whether the value was checked against a schema.
    #[must_use]
    pub const fn is_validated(&self) -> bool {
        matches!(self, Self::Validated(_))
    }
}

/// Outcome of a single extraction.
pub type ExtractionResult = Result<Extracted, ExtractionFailure>;

/// Settings for [`StructuredOutputExtractor`].
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Which fenced block to use; negative counts from the end. Default `-1`.
    pub selection_index: isize,
    /// Parser permissiveness. Default [`DecodeStrategy::Tolerant`].
    pub strategy: DecodeStrategy,
    /// Optional schema to validate against.
    pub schema: Option<SchemaDescriptor>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            selection_index: -1,
            strategy: DecodeStrategy::default(),
            schema: None,
        }
    }
}

impl ExtractConfig {
    /// Sets the block selection index.
    #[must_use]
    pub const fn selection_index(mut self, index: isize) -> Self {
        self.selection_index = index;
        self
    }

    /// Sets the decode strategy.
    #[must_use]
    pub const fn strategy(mut self, strategy: DecodeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the schema.
    #[must_use]
    pub fn schema(mut self, schema: SchemaDescriptor) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Turns raw model text into a structured value.
///
/// Extraction is a pure function of the text and the configuration: the same
/// input always yields the same result, and the extractor never mutates shared
/// state, so one instance can be used from many tasks at once.
///
/// # Example
///
/// ```
/// use agentkit_extraction::extract::StructuredOutputExtractor;
/// use serde_json::json;
///
/// let extractor = StructuredOutputExtractor::new();
/// let text = "Sure!\n```json\n{\"city\": \"Paris\"}\n```";
/// let value = extractor.extract(text).unwrap().into_value();
/// assert_eq!(value, json!({"city": "Paris"}));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StructuredOutputExtractor {
    config: ExtractConfig,
}

impl StructuredOutputExtractor {
    /// Extractor with default settings: last block, tolerant decoding, no schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Extractor with explicit settings.
    #[must_use]
    pub const fn with_config(config: ExtractConfig) -> Self {
        Self { config }
    }

    /// Extractor validating against the schema derived from `T`.
    #[must_use]
    pub fn for_type<T: JsonSchema>() -> Self {
        Self::with_config(ExtractConfig::default().schema(SchemaDescriptor::for_type::<T>()))
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Runs locate, decode and (optionally) validate over `raw`.
    ///
    /// # Errors
    ///
    /// Returns the [`ExtractionFailure`] of the first stage that fails.
    pub fn extract(&self, raw: &str) -> ExtractionResult {
        let candidate = select_candidate(raw, self.config.selection_index)?;
        let value = decode(candidate, self.config.strategy)?;

        let Some(schema) = &self.config.schema else {
            return Ok(Extracted::Parsed(value));
        };
        schema
            .validate(value)
            .map(Extracted::Validated)
            .map_err(|(errors, value)| ExtractionFailure::SchemaMismatch { errors, value })
    }

    /// Extracts and deserializes into `T`.
    ///
    /// When no schema is configured, the schema derived from `T` is used.
    ///
    /// # Errors
    ///
    /// Returns the extraction failure, or [`ExtractionFailure::SchemaMismatch`] when
    /// the value does not deserialize into `T`.
    pub fn extract_as<T: DeserializeOwned + JsonSchema>(
        &self,
        raw: &str,
    ) -> Result<T, ExtractionFailure> {
        let value = if self.config.schema.is_some() {
            self.extract(raw)?.into_value()
        } else {
            let config = self.config.clone().schema(SchemaDescriptor::for_type::<T>());
            Self::with_config(config).extract(raw)?.into_value()
        };
        serde_json::from_value(value.clone()).map_err(|e| ExtractionFailure::SchemaMismatch {
            errors: vec![FieldError::new("", e.to_string())],
            value,
        })
    }
}
