//! Narration duration model and scene validation.
//!
//! Narration is assumed to run at a fixed pace per word. A scene fits when its
//! narration takes no longer than [`SAFETY_MARGIN`] of the clip time available
//! to it; the overage is measured against that margin. Scenes without
//! resolvable clip time are skipped, never flagged.

use reelgen_models::{DurationViolation, Scene, ScenePlan, SelectedVideo};

/// Spoken seconds per word.
pub const SECONDS_PER_WORD: f64 = 0.5;

/// Fraction of the clip narration may occupy.
pub const SAFETY_MARGIN: f64 = 0.95;

/// Whitespace-delimited word count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Estimated narration seconds for `text`.
pub fn narration_seconds(text: &str) -> f64 {
    word_count(text) as f64 * SECONDS_PER_WORD
}

/// Largest word count that fits in `available_seconds` with the safety margin.
pub fn word_budget(available_seconds: f64) -> usize {
    if available_seconds <= 0.0 {
        return 0;
    }
    (available_seconds * SAFETY_MARGIN / SECONDS_PER_WORD).floor() as usize
}

/// Clip seconds available to a scene.
///
/// The scene's own positive trim duration wins, then the full duration of the
/// matching selected video. `None` when neither resolves.
pub fn available_seconds(scene: &Scene, videos: &[SelectedVideo]) -> Option<f64> {
    let asset = scene.video_asset.as_ref()?;

    if let Some(trim) = asset.trim_duration_seconds() {
        return Some(trim);
    }

    videos
        .iter()
        .find(|v| v.id == asset.id)
        .map(|v| v.duration_seconds)
        .filter(|secs| secs.is_finite() && *secs > 0.0)
}

/// Check a single scene. `scene_index` is its zero-based position.
pub fn check_scene(
    scene_index: usize,
    scene: &Scene,
    videos: &[SelectedVideo],
) -> Option<DurationViolation> {
    let video_length_seconds = available_seconds(scene, videos)?;
    let text_length_seconds = narration_seconds(&scene.script_text);
    let allowed_seconds = video_length_seconds * SAFETY_MARGIN;

    (text_length_seconds > allowed_seconds).then(|| DurationViolation {
        scene_index,
        text_length_seconds,
        video_length_seconds,
        overage_seconds: text_length_seconds - allowed_seconds,
    })
}

/// Every scene whose narration overruns its clip, in plan order.
pub fn validate_scene_durations(plan: &ScenePlan, videos: &[SelectedVideo]) -> Vec<DurationViolation> {
    plan.scenes
        .iter()
        .enumerate()
        .filter_map(|(index, scene)| check_scene(index, scene, videos))
        .collect()
}
