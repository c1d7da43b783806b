//! Scene plan and render template pipeline.
//!
//! This crate provides:
//! - Narration duration validation and the bounded AI repair loop
//! - Structural normalization of generated render templates
//! - Caption and narration voice configuration
//! - Plan-gated watermarking backed by the usage store
//! - The orchestrator sequencing all of the above

pub mod captions;
pub mod config;
pub mod duration;
pub mod error;
pub mod gemini;
pub mod logging;
pub mod metrics;
pub mod normalize;
pub mod orchestrator;
pub mod planner;
pub mod prompts;
pub mod repair;
pub mod user_plan;
pub mod voice;
pub mod watermark;

pub use captions::{apply_captions, CaptionPreset, CaptionStyle};
pub use config::{PipelineConfig, WatermarkSettings};
pub use duration::{validate_scene_durations, word_budget, word_count};
pub use error::{PipelineError, PipelineResult};
pub use gemini::{GeminiConfig, GeminiPlanner};
pub use logging::PipelineLogger;
pub use normalize::normalize_template;
pub use orchestrator::{PipelineOutput, PipelinePhase, PipelineWarning, TemplateOrchestrator};
pub use planner::{PlannerError, ScenePlanner};
pub use repair::{simplify_video_assets, RepairLoop, RepairOutcome, MAX_REPAIR_ATTEMPTS};
pub use user_plan::{FirestorePlanStore, PlanStore, PlanStoreError};
pub use voice::reconcile_voices;
pub use watermark::{WatermarkDecision, WatermarkGate, WatermarkReason};
