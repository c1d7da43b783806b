//! Generative planning collaborator.
//!
//! The pipeline treats the generative model as an opaque function: a request
//! goes in, a structured plan or untyped template comes out, or the call fails.

use async_trait::async_trait;
use reelgen_models::{DurationViolation, ScenePlan, ValidationConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Planner request failed: {0}")]
    Request(String),

    #[error("Planner returned malformed output: {0}")]
    MalformedOutput(String),

    #[error("Planner configuration error: {0}")]
    Config(String),
}

impl PlannerError {
    pub fn request(msg: impl Into<String>) -> Self {
        Self::Request(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedOutput(msg.into())
    }
}

/// Produces scene plans and render templates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScenePlanner: Send + Sync {
    /// Draft a scene plan for the request.
    async fn plan_scenes(&self, config: &ValidationConfig) -> Result<ScenePlan, PlannerError>;

    /// Rewrite the scenes named in `violations` so their narration fits.
    ///
    /// Returns a full candidate plan; the caller decides which scenes to take.
    async fn repair_scenes(
        &self,
        plan: &ScenePlan,
        violations: &[DurationViolation],
        config: &ValidationConfig,
    ) -> Result<ScenePlan, PlannerError>;

    /// Generate a render template for a validated plan.
    ///
    /// The result is untrusted JSON and is parsed by the caller.
    async fn generate_template(
        &self,
        plan: &ScenePlan,
        config: &ValidationConfig,
    ) -> Result<serde_json::Value, PlannerError>;
}
