//! Generation request inputs.

use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scene::SelectedVideo;

/// Vertical placement of captions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptionPlacement {
    Top,
    #[serde(alias = "center")]
    Middle,
    #[default]
    Bottom,
}

impl CaptionPlacement {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionPlacement::Top => "top",
            CaptionPlacement::Middle => "middle",
            CaptionPlacement::Bottom => "bottom",
        }
    }

    /// Vertical anchor written into `y_alignment`.
    pub fn y_alignment(&self) -> &'static str {
        match self {
            CaptionPlacement::Top => "15%",
            CaptionPlacement::Middle => "50%",
            CaptionPlacement::Bottom => "80%",
        }
    }
}

impl std::fmt::Display for CaptionPlacement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CaptionPlacement {
    type Err = CaptionPlacementParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "top" => Ok(CaptionPlacement::Top),
            "middle" | "center" => Ok(CaptionPlacement::Middle),
            "bottom" => Ok(CaptionPlacement::Bottom),
            _ => Err(CaptionPlacementParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown caption placement: {0}")]
pub struct CaptionPlacementParseError(String);

/// Caption configuration for a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CaptionStructure {
    /// Captions are on unless explicitly disabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub placement: Option<CaptionPlacement>,
    /// Highlight color, e.g. `#ffffff`.
    #[serde(default)]
    pub color: Option<String>,
    /// Transcript effect name, e.g. `highlight`, `karaoke`.
    #[serde(default)]
    pub effect: Option<String>,
    /// Named font preset.
    #[serde(default)]
    pub preset: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Default for CaptionStructure {
    fn default() -> Self {
        Self {
            enabled: true,
            placement: None,
            color: None,
            effect: None,
            preset: None,
        }
    }
}

impl CaptionStructure {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// Editorial guidance forwarded to the planner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditorialProfile {
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub pacing: Option<String>,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl EditorialProfile {
    pub fn is_empty(&self) -> bool {
        self.tone.is_none()
            && self.pacing.is_none()
            && self.target_audience.is_none()
            && self.notes.is_none()
    }
}

fn default_language() -> String {
    "en".to_string()
}

/// Immutable input bundle for one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfig {
    #[serde(alias = "script_text")]
    pub script_text: String,
    #[serde(default, alias = "selected_videos")]
    pub selected_videos: Vec<SelectedVideo>,
    #[serde(default, alias = "caption_structure")]
    pub caption_structure: CaptionStructure,
    #[serde(default, alias = "editorial_profile")]
    pub editorial_profile: EditorialProfile,
    /// Target voice. Absent or empty disables voice reconciliation.
    #[serde(default, alias = "voice_id")]
    pub voice_id: Option<String>,
    #[serde(default = "default_language", alias = "output_language")]
    pub output_language: String,
    #[serde(default, alias = "caption_structure_override")]
    pub caption_structure_override: Option<CaptionStructure>,
    /// Owner of the request. Gates watermarking.
    #[serde(default, alias = "user_id")]
    pub user_id: Option<String>,
}

impl ValidationConfig {
    pub fn new(script_text: impl Into<String>) -> Self {
        Self {
            script_text: script_text.into(),
            selected_videos: Vec::new(),
            caption_structure: CaptionStructure::default(),
            editorial_profile: EditorialProfile::default(),
            voice_id: None,
            output_language: default_language(),
            caption_structure_override: None,
            user_id: None,
        }
    }

    pub fn with_videos(mut self, videos: Vec<SelectedVideo>) -> Self {
        self.selected_videos = videos;
        self
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = Some(voice_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_captions(mut self, captions: CaptionStructure) -> Self {
        self.caption_structure = captions;
        self
    }

    pub fn with_caption_override(mut self, captions: CaptionStructure) -> Self {
        self.caption_structure_override = Some(captions);
        self
    }

    /// The caption configuration in force: the override wins when present.
    pub fn effective_captions(&self) -> &CaptionStructure {
        self.caption_structure_override
            .as_ref()
            .unwrap_or(&self.caption_structure)
    }

    /// Target voice id, trimmed. `None` when absent or blank.
    pub fn target_voice(&self) -> Option<&str> {
        self.voice_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// User id, trimmed. `None` when absent or blank.
    pub fn owner(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Reject inputs no phase can work with.
    pub fn validate(&self) -> Result<(), String> {
        if self.script_text.trim().is_empty() {
            return Err("script text is empty".to_string());
        }
        for video in &self.selected_videos {
            if video.id.trim().is_empty() {
                return Err("selected video has an empty id".to_string());
            }
            if !video.duration_seconds.is_finite() || video.duration_seconds < 0.0 {
                return Err(format!(
                    "selected video '{}' has invalid duration {}",
                    video.id, video.duration_seconds
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_from_str() {
        assert_eq!("TOP".parse::<CaptionPlacement>().unwrap(), CaptionPlacement::Top);
        assert_eq!("center".parse::<CaptionPlacement>().unwrap(), CaptionPlacement::Middle);
        assert!("left".parse::<CaptionPlacement>().is_err());
    }

    #[test]
    fn test_caption_structure_defaults_enabled() {
        let captions: CaptionStructure = serde_json::from_str("{}").unwrap();
        assert!(captions.enabled);
        assert!(captions.placement.is_none());
    }

    #[test]
    fn test_override_wins() {
        let config = ValidationConfig::new("hello")
            .with_captions(CaptionStructure::default())
            .with_caption_override(CaptionStructure::disabled());
        assert!(!config.effective_captions().enabled);

        let plain = ValidationConfig::new("hello").with_captions(CaptionStructure::disabled());
        assert!(!plain.effective_captions().enabled);
    }

    #[test]
    fn test_blank_voice_and_user_are_absent() {
        let config = ValidationConfig::new("hello").with_voice("  ").with_user("");
        assert_eq!(config.target_voice(), None);
        assert_eq!(config.owner(), None);
    }

    #[test]
    fn test_deserialize_request() {
        let config: ValidationConfig = serde_json::from_str(
            r#"{
                "scriptText": "Five tips for better sleep",
                "selectedVideos": [{"id": "v1", "durationSeconds": 12}],
                "captionStructure": {"enabled": true, "placement": "top"},
                "voiceId": "voice-123",
                "userId": "uid-1"
            }"#,
        )
        .unwrap();
        assert_eq!(config.output_language, "en");
        assert_eq!(config.selected_videos.len(), 1);
        assert_eq!(
            config.effective_captions().placement,
            Some(CaptionPlacement::Top)
        );
        assert_eq!(config.target_voice(), Some("voice-123"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_script() {
        assert!(ValidationConfig::new("   ").validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_duration() {
        let config =
            ValidationConfig::new("hi").with_videos(vec![SelectedVideo::new("v1", -1.0)]);
        assert!(config.validate().is_err());
    }
}
