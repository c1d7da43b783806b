//! Render template document model.
//!
//! Templates arrive from the generative step as untyped JSON. They are parsed
//! into a closed tagged union over element kinds: unknown kinds, non-sequence
//! `elements` and missing top-level fields are rejected here, before any
//! normalization runs.
//!
//! Properties the pipeline does not reason about are preserved verbatim in each
//! node's `extra` map so the rendering backend still receives them.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{TemplateError, TemplateResult};
use crate::lenient;

// =============================================================================
// Constants
// =============================================================================

/// Portrait output width required by the vertical-video contract.
pub const PORTRAIT_WIDTH: u32 = 1080;

/// Portrait output height: `1080 * (1920 / 1080)`.
pub const PORTRAIT_HEIGHT: u32 = 1920;

/// Track layer contract. Higher tracks draw on top.
pub mod tracks {
    pub const VIDEO: u32 = 1;
    pub const TEXT: u32 = 2;
    pub const AUDIO: u32 = 3;
    /// Watermark image, always topmost.
    pub const WATERMARK: u32 = 4;
}

/// Pass-through properties.
pub type Props = Map<String, Value>;

// =============================================================================
// Time
// =============================================================================

/// Start time of an element within its composition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ElementTime {
    /// Absolute offset in seconds.
    Seconds(f64),
    /// Start when the previous element on the same track ends.
    Auto,
}

impl Serialize for ElementTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ElementTime::Auto => serializer.serialize_str("auto"),
            ElementTime::Seconds(secs) if secs.fract() == 0.0 && secs.abs() < 1e15 => {
                serializer.serialize_i64(*secs as i64)
            }
            ElementTime::Seconds(secs) => serializer.serialize_f64(*secs),
        }
    }
}

impl<'de> Deserialize<'de> for ElementTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_f64()
                .map(ElementTime::Seconds)
                .ok_or_else(|| D::Error::custom("time out of range")),
            Value::String(s) if s.trim().eq_ignore_ascii_case("auto") => Ok(ElementTime::Auto),
            Value::String(s) => lenient::parse_number(&s)
                .map(ElementTime::Seconds)
                .ok_or_else(|| D::Error::custom(format!("invalid time '{}'", s))),
            other => Err(D::Error::custom(format!("invalid time {}", other))),
        }
    }
}

// =============================================================================
// Elements
// =============================================================================

/// Element kinds accepted inside a composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Video,
    Audio,
    Text,
    Image,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Video => "video",
            ElementKind::Audio => "audio",
            ElementKind::Text => "text",
            ElementKind::Image => "image",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "video" => Ok(ElementKind::Video),
            "audio" => Ok(ElementKind::Audio),
            "text" => Ok(ElementKind::Text),
            "image" => Ok(ElementKind::Image),
            other => Err(other.to_string()),
        }
    }
}

/// Source clip layer. Always silent once normalized.
///
/// The typed fields are the ones normalization forces, so values it cannot
/// read are dropped rather than rejected. Trims and layout stay in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoElement {
    #[serde(default, deserialize_with = "lenient::forgiving_u32", skip_serializing_if = "Option::is_none")]
    pub track: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient::forgiving_string", skip_serializing_if = "Option::is_none")]
    pub fit: Option<String>,
    /// Serialized even when `None`: an explicit null spans the composition.
    #[serde(default, deserialize_with = "lenient::forgiving_f64")]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient::forgiving_f64", skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, deserialize_with = "lenient::forgiving_time", skip_serializing_if = "Option::is_none")]
    pub time: Option<ElementTime>,
    #[serde(flatten)]
    pub extra: Props,
}

/// Narration layer. `provider` encodes the voice identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioElement {
    #[serde(default, deserialize_with = "lenient::forgiving_u32", skip_serializing_if = "Option::is_none")]
    pub track: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Misplaced narration text; moved into `source` during normalization.
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(flatten)]
    pub extra: Props,
}

/// Text layer: captions and titles.
///
/// Style properties are kept as raw JSON: captions overwrite them, and every
/// other text element hands them to the renderer untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextElement {
    #[serde(default, deserialize_with = "lenient::forgiving_u32", skip_serializing_if = "Option::is_none")]
    pub track: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Name of the audio element this caption transcribes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_color: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_effect: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_alignment: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_alignment: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<Value>,
    #[serde(flatten)]
    pub extra: Props,
}

impl TextElement {
    /// Whether this text element is a caption/subtitle layer.
    ///
    /// Captions either transcribe an audio element or are named as such.
    pub fn is_caption(&self) -> bool {
        if self.transcript_source.as_deref().is_some_and(|s| !s.trim().is_empty()) {
            return true;
        }
        self.name.as_deref().is_some_and(|name| {
            let lower = name.to_lowercase();
            lower.contains("caption") || lower.contains("subtitle")
        })
    }
}

/// Image layer (logos, stills, the watermark). Layout lives in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageElement {
    #[serde(default, deserialize_with = "lenient::opt_u32", skip_serializing_if = "Option::is_none")]
    pub track: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(flatten)]
    pub extra: Props,
}

/// A renderable element inside a composition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Video(VideoElement),
    Audio(AudioElement),
    Text(TextElement),
    Image(ImageElement),
}

impl Element {
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Video(_) => ElementKind::Video,
            Element::Audio(_) => ElementKind::Audio,
            Element::Text(_) => ElementKind::Text,
            Element::Image(_) => ElementKind::Image,
        }
    }

    pub fn track(&self) -> Option<u32> {
        match self {
            Element::Video(e) => e.track,
            Element::Audio(e) => e.track,
            Element::Text(e) => e.track,
            Element::Image(e) => e.track,
        }
    }

    pub fn is_caption(&self) -> bool {
        matches!(self, Element::Text(text) if text.is_caption())
    }

    /// Parse one element. `path` locates it in error messages.
    pub fn from_value(value: Value, path: &str) -> TemplateResult<Self> {
        let Value::Object(mut obj) = value else {
            return Err(TemplateError::invalid_field(path, "expected an object"));
        };

        let kind_name = match obj.remove("type") {
            Some(Value::String(s)) => s,
            Some(other) => {
                return Err(TemplateError::invalid_field(
                    format!("{}.type", path),
                    format!("expected a string, got {}", other),
                ))
            }
            None => return Err(TemplateError::missing_field(format!("{}.type", path))),
        };

        let kind: ElementKind =
            kind_name
                .parse()
                .map_err(|_| TemplateError::UnknownElementType {
                    kind: kind_name.clone(),
                    path: path.to_string(),
                })?;

        let body = Value::Object(obj);
        let parsed = match kind {
            ElementKind::Video => serde_json::from_value(body).map(Element::Video),
            ElementKind::Audio => serde_json::from_value(body).map(Element::Audio),
            ElementKind::Text => serde_json::from_value(body).map(Element::Text),
            ElementKind::Image => serde_json::from_value(body).map(Element::Image),
        };

        parsed.map_err(|e| TemplateError::invalid_field(path, e.to_string()))
    }
}

impl<'de> Deserialize<'de> for Element {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Element::from_value(value, "element").map_err(D::Error::custom)
    }
}

// =============================================================================
// Composition
// =============================================================================

/// One scene's element group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composition {
    pub elements: Vec<Element>,
    pub extra: Props,
}

impl Composition {
    pub fn new(elements: Vec<Element>) -> Self {
        Self {
            elements,
            extra: Props::new(),
        }
    }

    /// Composition name, if the generator assigned one.
    pub fn name(&self) -> Option<&str> {
        self.extra.get("name").and_then(Value::as_str)
    }

    pub fn count_kind(&self, kind: ElementKind) -> usize {
        self.elements.iter().filter(|e| e.kind() == kind).count()
    }

    /// Parse the composition at top-level position `index`.
    pub fn from_value(value: Value, index: usize) -> TemplateResult<Self> {
        let path = format!("elements[{}]", index);
        let Value::Object(mut obj) = value else {
            return Err(TemplateError::invalid_field(path, "expected an object"));
        };

        match obj.remove("type") {
            Some(Value::String(kind)) if kind.eq_ignore_ascii_case("composition") => {}
            Some(Value::String(kind)) => {
                return Err(TemplateError::UnexpectedTopLevelElement { index, kind })
            }
            Some(other) => {
                return Err(TemplateError::invalid_field(
                    format!("{}.type", path),
                    format!("expected a string, got {}", other),
                ))
            }
            None => return Err(TemplateError::missing_field(format!("{}.type", path))),
        }

        let items = match obj.remove("elements") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => {
                return Err(TemplateError::missing_field(format!("{}.elements", path)))
            }
            Some(_) => return Err(TemplateError::not_a_sequence(format!("{}.elements", path))),
        };

        let elements = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| Element::from_value(item, &format!("{}.elements[{}]", path, i)))
            .collect::<TemplateResult<Vec<_>>>()?;

        Ok(Self {
            elements,
            extra: obj,
        })
    }
}

impl Serialize for Composition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.extra.len() + 2))?;
        map.serialize_entry("type", "composition")?;
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry("elements", &self.elements)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Composition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Composition::from_value(value, 0).map_err(D::Error::custom)
    }
}

// =============================================================================
// Render Template
// =============================================================================

/// The document consumed by the rendering backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderTemplate {
    pub output_format: String,
    pub width: u32,
    pub height: u32,
    pub elements: Vec<Composition>,
    #[serde(flatten)]
    pub extra: Props,
}

impl RenderTemplate {
    /// Empty portrait template.
    pub fn portrait(output_format: impl Into<String>) -> Self {
        Self {
            output_format: output_format.into(),
            width: PORTRAIT_WIDTH,
            height: PORTRAIT_HEIGHT,
            elements: Vec::new(),
            extra: Props::new(),
        }
    }

    pub fn with_composition(mut self, composition: Composition) -> Self {
        self.elements.push(composition);
        self
    }

    pub fn is_portrait(&self) -> bool {
        self.width == PORTRAIT_WIDTH && self.height == PORTRAIT_HEIGHT
    }

    /// Every element across all compositions.
    pub fn iter_elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().flat_map(|c| c.elements.iter())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Parse an untrusted template document.
    ///
    /// Checks the top-level shape (`output_format`, `width`, `height`,
    /// `elements` as a sequence of compositions) and every element kind.
    /// Dimensions are parsed here but their portrait contract is enforced by
    /// normalization.
    pub fn from_value(value: Value) -> TemplateResult<Self> {
        let Value::Object(mut obj) = value else {
            return Err(TemplateError::NotAnObject);
        };

        let output_format = match obj.remove("output_format") {
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            Some(Value::String(_)) | Some(Value::Null) | None => {
                return Err(TemplateError::missing_field("output_format"))
            }
            Some(other) => {
                return Err(TemplateError::invalid_field(
                    "output_format",
                    format!("expected a string, got {}", other),
                ))
            }
        };

        let items = match obj.remove("elements") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => return Err(TemplateError::missing_field("elements")),
            Some(_) => return Err(TemplateError::not_a_sequence("elements")),
        };

        let width = take_dimension(&mut obj, "width")?;
        let height = take_dimension(&mut obj, "height")?;

        let elements = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| Composition::from_value(item, index))
            .collect::<TemplateResult<Vec<_>>>()?;

        Ok(Self {
            output_format,
            width,
            height,
            elements,
            extra: obj,
        })
    }
}

impl<'de> Deserialize<'de> for RenderTemplate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        RenderTemplate::from_value(value).map_err(D::Error::custom)
    }
}

fn take_dimension(obj: &mut Props, field: &str) -> TemplateResult<u32> {
    let value = obj
        .remove(field)
        .filter(|v| !v.is_null())
        .ok_or_else(|| TemplateError::missing_field(field))?;

    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => lenient::parse_number(s),
        _ => None,
    };

    match number {
        Some(n) if n > 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => Ok(n as u32),
        _ => Err(TemplateError::invalid_field(
            field,
            format!("expected a positive integer, got {}", value),
        )),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "output_format": "mp4",
            "width": 1080,
            "height": 1920,
            "frame_rate": 30,
            "elements": [{
                "type": "composition",
                "name": "Scene-1",
                "track": 1,
                "elements": [
                    {"type": "video", "source": "https://cdn.example.com/a.mp4", "fit": "contain", "x": "50%"},
                    {"type": "audio", "text": "Hello there", "provider": "elevenlabs voice_id=abc"},
                    {"type": "text", "name": "Subtitles", "transcript_source": "Voiceover-1"}
                ]
            }]
        })
    }

    #[test]
    fn test_parse_sample_template() {
        let template = RenderTemplate::from_value(sample()).unwrap();
        assert_eq!(template.output_format, "mp4");
        assert!(template.is_portrait());
        assert_eq!(template.elements.len(), 1);

        let composition = &template.elements[0];
        assert_eq!(composition.name(), Some("Scene-1"));
        assert_eq!(composition.count_kind(ElementKind::Video), 1);
        assert_eq!(composition.count_kind(ElementKind::Audio), 1);
        assert!(composition.elements[2].is_caption());
        assert_eq!(template.extra.get("frame_rate"), Some(&json!(30)));
    }

    #[test]
    fn test_unknown_properties_survive_round_trip() {
        let template = RenderTemplate::from_value(sample()).unwrap();
        let value = template.to_value();
        let video = &value["elements"][0]["elements"][0];
        assert_eq!(video["type"], json!("video"));
        assert_eq!(video["x"], json!("50%"));
        assert_eq!(value["elements"][0]["type"], json!("composition"));
        assert_eq!(value["elements"][0]["name"], json!("Scene-1"));
    }

    #[test]
    fn test_missing_output_format_rejected() {
        let mut value = sample();
        value.as_object_mut().unwrap().remove("output_format");
        assert_eq!(
            RenderTemplate::from_value(value),
            Err(TemplateError::missing_field("output_format"))
        );
    }

    #[test]
    fn test_missing_elements_rejected() {
        let mut value = sample();
        value.as_object_mut().unwrap().remove("elements");
        assert_eq!(
            RenderTemplate::from_value(value),
            Err(TemplateError::missing_field("elements"))
        );
    }

    #[test]
    fn test_non_sequence_elements_rejected() {
        let mut value = sample();
        value["elements"] = json!({"type": "composition"});
        assert_eq!(
            RenderTemplate::from_value(value),
            Err(TemplateError::not_a_sequence("elements"))
        );

        let mut nested = sample();
        nested["elements"][0]["elements"] = json!("video");
        assert_eq!(
            RenderTemplate::from_value(nested),
            Err(TemplateError::not_a_sequence("elements[0].elements"))
        );
    }

    #[test]
    fn test_unknown_element_kind_rejected() {
        let mut value = sample();
        value["elements"][0]["elements"][0]["type"] = json!("shape");
        let err = RenderTemplate::from_value(value).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::UnknownElementType { ref kind, .. } if kind == "shape"
        ));
    }

    #[test]
    fn test_top_level_non_composition_rejected() {
        let mut value = sample();
        value["elements"] = json!([{"type": "video", "source": "a.mp4"}]);
        assert_eq!(
            RenderTemplate::from_value(value),
            Err(TemplateError::UnexpectedTopLevelElement {
                index: 0,
                kind: "video".to_string()
            })
        );
    }

    #[test]
    fn test_string_dimensions_accepted() {
        let mut value = sample();
        value["width"] = json!("1080");
        let template = RenderTemplate::from_value(value).unwrap();
        assert_eq!(template.width, 1080);
    }

    #[test]
    fn test_invalid_dimension_rejected() {
        let mut value = sample();
        value["height"] = json!("tall");
        assert!(matches!(
            RenderTemplate::from_value(value),
            Err(TemplateError::InvalidField { ref field, .. }) if field == "height"
        ));
    }

    #[test]
    fn test_element_time_serde() {
        let auto: ElementTime = serde_json::from_value(json!("auto")).unwrap();
        assert_eq!(auto, ElementTime::Auto);
        let zero: ElementTime = serde_json::from_value(json!(0)).unwrap();
        assert_eq!(zero, ElementTime::Seconds(0.0));
        assert_eq!(serde_json::to_value(ElementTime::Seconds(0.0)).unwrap(), json!(0));
        assert_eq!(serde_json::to_value(ElementTime::Seconds(1.5)).unwrap(), json!(1.5));
        assert_eq!(serde_json::to_value(ElementTime::Auto).unwrap(), json!("auto"));
    }

    #[test]
    fn test_video_duration_serialized_as_null() {
        let element = Element::Video(VideoElement::default());
        let value = serde_json::to_value(&element).unwrap();
        assert_eq!(value["type"], json!("video"));
        assert!(value.get("duration").is_some_and(Value::is_null));
    }

    #[test]
    fn test_pass_through_fields_keep_their_shape() {
        let value = json!({
            "output_format": "mp4",
            "width": 1080,
            "height": 1920,
            "elements": [{
                "type": "composition",
                "elements": [
                    {"type": "video", "source": "a.mp4", "trim_start": "2 s", "duration": null},
                    {"type": "audio", "source": "hi", "volume": "80%", "duration": "auto"},
                    {"type": "text", "text": "Title", "font_weight": 700, "font_size": 48, "time": "1.5 s"},
                    {"type": "image", "source": "logo.png", "opacity": 0.5, "time": 2}
                ]
            }]
        });

        let template = RenderTemplate::from_value(value.clone()).unwrap();
        assert_eq!(template.to_value(), value);
    }

    #[test]
    fn test_caption_detection() {
        let named = TextElement {
            name: Some("Caption-2".to_string()),
            ..Default::default()
        };
        let title = TextElement {
            name: Some("Title".to_string()),
            text: Some("Top 5 tips".to_string()),
            ..Default::default()
        };
        assert!(named.is_caption());
        assert!(!title.is_caption());
    }
}
