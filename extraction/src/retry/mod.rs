//! Bounded retry of generation plus extraction.
//!
//! - [`RetryingGenerationController`] - sequential attempt loop with a shared budget
//! - [`RunFailure`] - terminal outcomes with attempt history
//! - [`RunMetrics`] - token and timing metrics
//! - [`RetryConfig`] - budget, timeout and feedback policy
//! - [`build_extraction_feedback`] - hint text for [`FeedbackPolicy::AppendHint`]

pub mod config;
pub mod controller;
pub mod error;
pub mod feedback;
pub mod metrics;

pub use config::{FeedbackPolicy, RetryConfig};
pub use controller::{RetryingGenerationController, RunResult, RunSuccess, run};
pub use error::{AttemptFailure, AttemptRecord, RunFailure};
pub use feedback::build_extraction_feedback;
pub use metrics::{RunMetrics, estimate_tokens};
