//! Pipeline configuration.

use std::time::Duration;

/// Default TTS model used when a narration element has no provider.
pub const DEFAULT_TTS_MODEL: &str = "eleven_multilingual_v2";

/// Default watermark asset.
pub const DEFAULT_WATERMARK_URL: &str = "https://assets.reelgen.app/watermark.png";

/// Watermark overlay settings.
///
/// ```ignore
/// let settings = WatermarkSettings::default()
///     .with_padding(30)
///     .with_opacity(0.8);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkSettings {
    /// Image URL placed in the overlay element.
    pub image_url: String,
    /// Distance from the right and bottom edges, in pixels.
    pub padding_px: u32,
    /// Opacity (0.0 to 1.0).
    pub opacity: f64,
    /// Rendered width in pixels.
    pub width_px: u32,
}

impl Default for WatermarkSettings {
    fn default() -> Self {
        Self {
            image_url: DEFAULT_WATERMARK_URL.to_string(),
            padding_px: 40,
            opacity: 0.6,
            width_px: 240,
        }
    }
}

impl WatermarkSettings {
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = url.into();
        self
    }

    pub fn with_padding(mut self, padding_px: u32) -> Self {
        self.padding_px = padding_px;
        self
    }

    /// Set opacity (0.0 = invisible, 1.0 = fully opaque).
    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn with_width(mut self, width_px: u32) -> Self {
        self.width_px = width_px;
        self
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            image_url: std::env::var("WATERMARK_IMAGE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.image_url),
            padding_px: env_parse("WATERMARK_PADDING_PX").unwrap_or(defaults.padding_px),
            opacity: env_parse::<f64>("WATERMARK_OPACITY")
                .map(|o| o.clamp(0.0, 1.0))
                .unwrap_or(defaults.opacity),
            width_px: env_parse("WATERMARK_WIDTH_PX").unwrap_or(defaults.width_px),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub watermark: WatermarkSettings,
    /// Model id used when synthesizing a provider string.
    pub default_tts_model: String,
    /// Output container requested from the template generator.
    pub output_format: String,
    /// Upper bound on a single plan lookup.
    pub plan_lookup_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            watermark: WatermarkSettings::default(),
            default_tts_model: DEFAULT_TTS_MODEL.to_string(),
            output_format: "mp4".to_string(),
            plan_lookup_timeout: Duration::from_secs(5),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            watermark: WatermarkSettings::from_env(),
            default_tts_model: std::env::var("DEFAULT_TTS_MODEL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.default_tts_model),
            output_format: std::env::var("OUTPUT_FORMAT")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.output_format),
            plan_lookup_timeout: env_parse("PLAN_LOOKUP_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.plan_lookup_timeout),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
