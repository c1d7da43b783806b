//! Caption configuration applied to templates.
//!
//! Disabled captions remove every caption text element and nothing else.
//! Enabled captions restyle caption elements from the request's configuration,
//! and a composition with narration but no caption gets one bound to its audio.

use reelgen_models::{
    tracks, CaptionPlacement, CaptionStructure, Composition, Element, RenderTemplate, TextElement,
};
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_CAPTION_COLOR: &str = "#ffffff";
pub const DEFAULT_CAPTION_EFFECT: &str = "highlight";

/// Font settings for a named caption look.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptionPreset {
    pub name: &'static str,
    pub font_family: &'static str,
    pub font_weight: &'static str,
    pub font_size: &'static str,
    pub stroke_color: Option<&'static str>,
    pub stroke_width: Option<&'static str>,
    /// Effect used when the request does not name one.
    pub default_effect: &'static str,
}

pub static PRESETS: &[CaptionPreset] = &[
    CaptionPreset {
        name: "classic",
        font_family: "Montserrat",
        font_weight: "700",
        font_size: "8 vmin",
        stroke_color: Some("#000000"),
        stroke_width: Some("1.6 vmin"),
        default_effect: DEFAULT_CAPTION_EFFECT,
    },
    CaptionPreset {
        name: "bold",
        font_family: "Anton",
        font_weight: "800",
        font_size: "10 vmin",
        stroke_color: Some("#000000"),
        stroke_width: Some("2 vmin"),
        default_effect: DEFAULT_CAPTION_EFFECT,
    },
    CaptionPreset {
        name: "minimal",
        font_family: "Inter",
        font_weight: "500",
        font_size: "6 vmin",
        stroke_color: None,
        stroke_width: None,
        default_effect: "fade",
    },
    CaptionPreset {
        name: "karaoke",
        font_family: "Poppins",
        font_weight: "700",
        font_size: "8 vmin",
        stroke_color: Some("#000000"),
        stroke_width: Some("1.5 vmin"),
        default_effect: "karaoke",
    },
];

impl CaptionPreset {
    /// Look up a preset by name. Unknown or absent names give `classic`.
    pub fn resolve(name: Option<&str>) -> &'static CaptionPreset {
        let wanted = name.map(|n| n.trim().to_lowercase());
        wanted
            .and_then(|n| PRESETS.iter().find(|p| p.name == n))
            .unwrap_or(&PRESETS[0])
    }
}

/// Concrete caption properties derived from a [`CaptionStructure`].
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionStyle {
    pub color: String,
    pub effect: String,
    pub placement: CaptionPlacement,
    pub preset: &'static CaptionPreset,
}

impl CaptionStyle {
    pub fn from_structure(captions: &CaptionStructure) -> Self {
        let preset = CaptionPreset::resolve(captions.preset.as_deref());
        let non_blank = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Self {
            color: non_blank(&captions.color).unwrap_or_else(|| DEFAULT_CAPTION_COLOR.to_string()),
            effect: non_blank(&captions.effect).unwrap_or_else(|| preset.default_effect.to_string()),
            placement: captions.placement.unwrap_or_default(),
            preset,
        }
    }

    /// Write this style onto a caption element.
    pub fn apply(&self, text: &mut TextElement) {
        text.track = Some(tracks::TEXT);
        text.transcript_color = Some(Value::from(self.color.as_str()));
        text.transcript_effect = Some(Value::from(self.effect.as_str()));
        text.x_alignment = Some(Value::from("50%"));
        text.y_alignment = Some(Value::from(self.placement.y_alignment()));
        text.font_family = Some(Value::from(self.preset.font_family));
        text.font_weight = Some(Value::from(self.preset.font_weight));
        text.font_size = Some(Value::from(self.preset.font_size));
        text.stroke_color = self.preset.stroke_color.map(Value::from);
        text.stroke_width = self.preset.stroke_width.map(Value::from);
    }
}

/// Apply the caption configuration to every composition.
pub fn apply_captions(template: RenderTemplate, captions: &CaptionStructure) -> RenderTemplate {
    let RenderTemplate {
        output_format,
        width,
        height,
        elements,
        extra,
    } = template;

    let elements = if captions.enabled {
        let style = CaptionStyle::from_structure(captions);
        elements
            .into_iter()
            .enumerate()
            .map(|(index, composition)| style_composition(composition, index + 1, &style))
            .collect()
    } else {
        elements.into_iter().map(strip_captions).collect()
    };

    RenderTemplate {
        output_format,
        width,
        height,
        elements,
        extra,
    }
}

fn strip_captions(mut composition: Composition) -> Composition {
    let before = composition.elements.len();
    composition.elements.retain(|e| !e.is_caption());
    let removed = before - composition.elements.len();
    if removed > 0 {
        debug!(removed, "Removed caption elements");
    }
    composition
}

fn style_composition(mut composition: Composition, scene: usize, style: &CaptionStyle) -> Composition {
    let mut styled = 0;
    for element in composition.elements.iter_mut() {
        if let Element::Text(text) = element {
            if text.is_caption() {
                style.apply(text);
                styled += 1;
            }
        }
    }
    if styled > 0 {
        return composition;
    }

    // Bind a new caption to the first narration element, naming it if needed.
    let narration = composition.elements.iter_mut().find_map(|e| match e {
        Element::Audio(audio) => Some(audio),
        _ => None,
    });
    let Some(audio) = narration else {
        return composition;
    };
    let source_name = audio
        .name
        .get_or_insert_with(|| format!("Voiceover-{}", scene))
        .clone();

    let mut caption = TextElement {
        name: Some(format!("Caption-{}", scene)),
        transcript_source: Some(source_name),
        ..Default::default()
    };
    style.apply(&mut caption);
    debug!(scene, "Injected caption element");
    composition.elements.push(Element::Text(caption));
    composition
}
