//! Shared data models for the ReelGen template pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Scene plans and selected source clips
//! - Render templates (compositions and the closed element union)
//! - Generation request configuration
//! - Plan classification for watermark gating

pub mod error;
pub mod lenient;
pub mod plan;
pub mod request;
pub mod scene;
pub mod template;

// Re-export common types
pub use error::{PlanError, PlanResult, TemplateError, TemplateResult};
pub use plan::{PlanClass, PlanRecord, FREE_TIER_TOKENS};
pub use request::{CaptionPlacement, CaptionStructure, EditorialProfile, ValidationConfig};
pub use scene::{
    scene_plan_schema, DurationViolation, Scene, ScenePlan, SelectedVideo, VideoAssetRef,
};
pub use template::{
    tracks, AudioElement, Composition, Element, ElementKind, ElementTime, ImageElement,
    RenderTemplate, TextElement, VideoElement, PORTRAIT_HEIGHT, PORTRAIT_WIDTH,
};
