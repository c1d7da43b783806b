//! Scene plan definitions.
//!
//! A [`ScenePlan`] is produced fresh per generation request by the planning
//! model, mutated through zero or more repair rounds, and discarded once a
//! render template has been derived from it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};
use crate::lenient;

/// Reference to the source clip bound to a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoAssetRef {
    /// Asset identifier, matched against [`SelectedVideo::id`].
    pub id: String,
    /// Trim start offset in seconds (string form as emitted by the planner).
    #[serde(default, alias = "trim_start", deserialize_with = "lenient::opt_string")]
    pub trim_start: Option<String>,
    /// Trim length in seconds (string form as emitted by the planner).
    #[serde(default, alias = "trim_duration", deserialize_with = "lenient::opt_string")]
    pub trim_duration: Option<String>,
    /// Source URL of the clip.
    #[serde(default)]
    pub url: String,
}

impl VideoAssetRef {
    /// Trim duration in seconds when it parses to a positive number.
    ///
    /// Zero, negative and unparsable values all mean "unknown".
    pub fn trim_duration_seconds(&self) -> Option<f64> {
        self.trim_duration
            .as_deref()
            .and_then(lenient::parse_number)
            .filter(|secs| *secs > 0.0)
    }

    /// Whether this record carries usable timing data.
    pub fn has_timing(&self) -> bool {
        self.trim_duration_seconds().is_some()
    }
}

/// One narrated segment of the generated video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    /// 1-based position in the plan.
    #[serde(alias = "scene_number")]
    pub scene_number: u32,
    /// Narration text for this scene.
    #[serde(default, alias = "script_text")]
    pub script_text: String,
    /// Source clip, if the planner assigned one.
    #[serde(default, alias = "video_asset")]
    pub video_asset: Option<VideoAssetRef>,
}

impl Scene {
    pub fn new(scene_number: u32, script_text: impl Into<String>) -> Self {
        Self {
            scene_number,
            script_text: script_text.into(),
            video_asset: None,
        }
    }

    pub fn with_asset(mut self, asset: VideoAssetRef) -> Self {
        self.video_asset = Some(asset);
        self
    }
}

/// Ordered sequence of scenes.
///
/// Invariant once checked by [`ScenePlan::ensure_sequential`]: non-empty and
/// scene numbers are the contiguous sequence `1..=len`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScenePlan {
    pub scenes: Vec<Scene>,
}

impl ScenePlan {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Enforce the plan's structural invariants.
    ///
    /// Returns the number of scenes whose number had to be rewritten to match
    /// its position. An empty plan is an error.
    pub fn ensure_sequential(&mut self) -> PlanResult<usize> {
        if self.scenes.is_empty() {
            return Err(PlanError::Empty);
        }

        let mut renumbered = 0;
        for (index, scene) in self.scenes.iter_mut().enumerate() {
            let expected = index as u32 + 1;
            if scene.scene_number != expected {
                scene.scene_number = expected;
                renumbered += 1;
            }
        }
        Ok(renumbered)
    }
}

/// A clip the user selected, with its full duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectedVideo {
    pub id: String,
    #[serde(alias = "duration_seconds", alias = "duration")]
    pub duration_seconds: f64,
    #[serde(default)]
    pub url: Option<String>,
}

impl SelectedVideo {
    pub fn new(id: impl Into<String>, duration_seconds: f64) -> Self {
        Self {
            id: id.into(),
            duration_seconds,
            url: None,
        }
    }
}

/// A scene whose narration does not fit the available clip time.
///
/// Produced by validation, consumed by the repair loop, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DurationViolation {
    /// Zero-based index into [`ScenePlan::scenes`].
    pub scene_index: usize,
    pub text_length_seconds: f64,
    pub video_length_seconds: f64,
    pub overage_seconds: f64,
}

/// JSON schema of [`ScenePlan`], embedded in planning prompts.
pub fn scene_plan_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(ScenePlan)).unwrap_or_default()
}
