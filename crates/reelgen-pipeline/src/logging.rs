//! Structured request logging.
//!
//! Every event carries the request id and the pipeline phase so a single
//! generation can be followed across planner calls and plan lookups.

use tracing::{error, info, warn, Span};
use uuid::Uuid;

/// Logger bound to one generation request.
#[derive(Debug, Clone)]
pub struct PipelineLogger {
    request_id: String,
    phase: &'static str,
}

impl PipelineLogger {
    /// Logger with a fresh random request id.
    pub fn new() -> Self {
        Self::with_request_id(Uuid::new_v4().to_string())
    }

    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            phase: "request",
        }
    }

    /// Same request, different phase.
    pub fn for_phase(&self, phase: &'static str) -> Self {
        Self {
            request_id: self.request_id.clone(),
            phase,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(request_id = %self.request_id, phase = self.phase, "Phase started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(request_id = %self.request_id, phase = self.phase, "{}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(request_id = %self.request_id, phase = self.phase, "Phase warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(request_id = %self.request_id, phase = self.phase, "Phase error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(request_id = %self.request_id, phase = self.phase, "Phase completed: {}", message);
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn phase(&self) -> &'static str {
        self.phase
    }

    /// Span covering the whole request.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("generation", request_id = %self.request_id)
    }
}

impl Default for PipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_request_ids_differ() {
        let a = PipelineLogger::new();
        let b = PipelineLogger::new();
        assert_ne!(a.request_id(), b.request_id());
    }

    #[test]
    fn test_for_phase_keeps_request_id() {
        let logger = PipelineLogger::with_request_id("req-42");
        let phase = logger.for_phase("captions");
        assert_eq!(phase.request_id(), "req-42");
        assert_eq!(phase.phase(), "captions");
        assert_eq!(logger.phase(), "request");
    }
}
