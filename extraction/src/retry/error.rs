//! Terminal failures of a controller run, with attempt history.

use std::time::Duration;
use thiserror::Error;

use super::metrics::RunMetrics;
use crate::extract::ExtractionFailure;
use crate::generate::GenerationError;

/// Why a single attempt did not succeed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttemptFailure {
    /// The generation call failed or timed out.
    #[error(transparent)]
    Generation(GenerationError),
    /// Text was generated but no valid value could be extracted.
    #[error(transparent)]
    Extraction(ExtractionFailure),
}

/// Record of a single failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    /// The attempt number (1-indexed).
    pub attempt_number: usize,
    /// What went wrong.
    pub failure: AttemptFailure,
    /// Generated text, when generation itself succeeded.
    pub raw_output: Option<String>,
    /// Time since the start of the run when the attempt ended.
    pub elapsed: Duration,
}

/// Terminal failure of [`RetryingGenerationController`](super::RetryingGenerationController).
///
/// Per-attempt failures never surface on their own; they are collected in `history`.
#[derive(Debug, Clone, Error)]
pub enum RunFailure {
    /// Every attempt was used and the last one failed at extraction.
    #[error("Extraction failed after {attempts} attempts: {last}")]
    Exhausted {
        /// Number of attempts made.
        attempts: usize,
        /// Failure of the final attempt.
        last: ExtractionFailure,
        /// Every failed attempt, oldest first.
        history: Vec<AttemptRecord>,
        /// Metrics tracked across all attempts.
        metrics: RunMetrics,
    },

    /// Every attempt was used and the last one failed at generation.
    #[error("Generation failed after {attempts} attempts: {last}")]
    GenerationExhausted {
        /// Number of attempts made.
        attempts: usize,
        /// Failure of the final attempt.
        last: GenerationError,
        /// Every failed attempt, oldest first.
        history: Vec<AttemptRecord>,
        /// Metrics tracked across all attempts.
        metrics: RunMetrics,
    },

    /// The caller cancelled the run.
    #[error("Run cancelled after {attempts} attempts")]
    Cancelled {
        /// Number of generation calls started before cancellation.
        attempts: usize,
        /// Every failed attempt before cancellation.
        history: Vec<AttemptRecord>,
        /// Metrics tracked up to cancellation.
        metrics: RunMetrics,
    },
}

impl RunFailure {
    /// Short machine-friendly name of the outcome, used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Exhausted { .. } => "exhausted",
            Self::GenerationExhausted { .. } => "generation_exhausted",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// Number of generation calls made.
    #[must_use]
    pub const fn attempts(&self) -> usize {
        match self {
            Self::Exhausted { attempts, .. }
            | Self::GenerationExhausted { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// Failed attempts, oldest first.
    #[must_use]
    pub fn history(&self) -> &[AttemptRecord] {
        match self {
            Self::Exhausted { history, .. }
            | Self::GenerationExhausted { history, .. }
            | Self::Cancelled { history, .. } => history,
        }
    }

    /// Metrics for the whole run.
    #[must_use]
    pub const fn metrics(&self) -> &RunMetrics {
        match self {
            Self::Exhausted { metrics, .. }
            | Self::GenerationExhausted { metrics, .. }
            | Self::Cancelled { metrics, .. } => metrics,
        }
    }
}
