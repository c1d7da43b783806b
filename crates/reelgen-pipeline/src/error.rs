//! Pipeline error types.

use reelgen_models::{PlanError, TemplateError};
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that fail a generation request.
///
/// Repair-round planner failures and plan-lookup failures are absorbed by
/// their phases and never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Structural error: {0}")]
    Structural(#[from] TemplateError),

    #[error("Invalid scene plan: {0}")]
    Plan(#[from] PlanError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Generation failed: {0}")]
    Generation(String),
}

impl PipelineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// Malformed template or plan shape. No retry can fix it.
    pub fn is_structural(&self) -> bool {
        matches!(self, PipelineError::Structural(_) | PipelineError::Plan(_))
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Structural(_) => "structural",
            PipelineError::Plan(_) => "plan",
            PipelineError::InvalidInput(_) => "invalid_input",
            PipelineError::Generation(_) => "generation",
        }
    }
}
