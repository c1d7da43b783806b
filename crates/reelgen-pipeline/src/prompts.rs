//! Prompt construction for the generative planner.

use reelgen_models::{
    scene_plan_schema, tracks, DurationViolation, EditorialProfile, ScenePlan, ValidationConfig,
    PORTRAIT_HEIGHT, PORTRAIT_WIDTH,
};

use crate::duration::{word_budget, SECONDS_PER_WORD};

pub fn planning_prompt(config: &ValidationConfig) -> String {
    let language = &config.output_language;
    let profile = profile_section(&config.editorial_profile);
    let clips = config
        .selected_videos
        .iter()
        .map(|v| {
            format!(
                "- id={} duration={}s url={}",
                v.id,
                v.duration_seconds,
                v.url.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let script = config.script_text.trim();
    let schema = scene_plan_schema();

    format!(
        r#"You are planning a vertical short-form video. Split the script into scenes, assign each scene one of the available clips and write its narration.
Narration is spoken at {SECONDS_PER_WORD} seconds per word; keep each scene's narration shorter than its clip.
Write narration in language: {language}
{profile}
Available clips:
{clips}

Script:
{script}

Number scenes from 1. Respond with JSON only, matching this schema:
{schema}
"#
    )
}

/// Prompt asking for shorter versions of the violating scenes only.
pub fn repair_prompt(plan: &ScenePlan, violations: &[DurationViolation], config: &ValidationConfig) -> String {
    let language = &config.output_language;
    let scenes = violations
        .iter()
        .map(|v| {
            let current = plan
                .scenes
                .get(v.scene_index)
                .map(|s| s.script_text.as_str())
                .unwrap_or("");
            format!(
                "- index {} (scene {}): narration {:.1}s, clip {:.1}s, over by {:.1}s, word budget {}\n  current narration: {}",
                v.scene_index,
                v.scene_index + 1,
                v.text_length_seconds,
                v.video_length_seconds,
                v.overage_seconds,
                word_budget(v.video_length_seconds),
                current
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let clips = if config.selected_videos.is_empty() {
        String::new()
    } else {
        let lines = config
            .selected_videos
            .iter()
            .map(|v| format!("- id={} duration={}s", v.id, v.duration_seconds))
            .collect::<Vec<_>>()
            .join("\n");
        format!("\nAvailable clips:\n{}\n", lines)
    };
    let plan_json = serde_json::to_string_pretty(plan).unwrap_or_default();

    format!(
        r#"Some scenes have narration longer than their clip. Rewrite ONLY the scenes listed below. Shorten the narration to the word budget, or pick a different clip or trim from the available clips. Every other scene must be returned exactly as given.
Language: {language}

Scenes to fix:
{scenes}
{clips}
Full current plan:
{plan_json}

Return the complete plan as JSON with the same number of scenes.
"#
    )
}

pub fn template_prompt(plan: &ScenePlan, config: &ValidationConfig, output_format: &str) -> String {
    let language = &config.output_language;
    let voice = config
        .target_voice()
        .map(|voice| format!("Narration voice id: {}\n", voice))
        .unwrap_or_default();
    let plan_json = serde_json::to_string_pretty(plan).unwrap_or_default();
    let (video, text, audio) = (tracks::VIDEO, tracks::TEXT, tracks::AUDIO);

    format!(
        r#"Build a render template for this scene plan. Respond with JSON only.
Top level: {{"output_format": "{output_format}", "width": {PORTRAIT_WIDTH}, "height": {PORTRAIT_HEIGHT}, "elements": [...]}}
One element of type "composition" per scene, each with its own "elements" array of video, audio, text or image elements.
Tracks: video={video}, text={text}, audio={audio}. Narration goes in the audio element's "source".
{voice}Language: {language}

Scene plan:
{plan_json}
"#
    )
}

/// Editorial profile lines, empty when no field is set.
fn profile_section(profile: &EditorialProfile) -> String {
    if profile.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = [
        ("tone", &profile.tone),
        ("pacing", &profile.pacing),
        ("audience", &profile.target_audience),
        ("notes", &profile.notes),
    ]
    .into_iter()
    .filter_map(|(label, value)| {
        value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .map(|v| format!("- {}: {}", label, v))
    })
    .collect();
    format!("Editorial profile:\n{}\n", lines.join("\n"))
}
