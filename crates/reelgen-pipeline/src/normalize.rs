//! Structural normalization of render templates.
//!
//! Takes a parsed template and returns a render-ready copy:
//! - portrait dimensions are a hard precondition, checked before anything else
//! - misplaced audio `text` is moved into `source`
//! - video layers are silent, cover the frame and span the composition
//! - within a composition the first video starts at 0 and the rest chain on
//! - elements sit on their contract tracks
//!
//! Normalizing an already normalized template is a no-op.

use reelgen_models::{
    tracks, AudioElement, Composition, Element, ElementTime, RenderTemplate, TemplateError,
    TemplateResult, TextElement, VideoElement, PORTRAIT_HEIGHT, PORTRAIT_WIDTH,
};

/// Check the vertical-video contract.
pub fn check_dimensions(template: &RenderTemplate) -> TemplateResult<()> {
    if template.width != PORTRAIT_WIDTH || template.height != PORTRAIT_HEIGHT {
        return Err(TemplateError::InvalidDimensions {
            width: template.width,
            height: template.height,
        });
    }
    Ok(())
}

/// Normalize a template. Fails without side effects on a dimension mismatch.
pub fn normalize_template(template: RenderTemplate) -> TemplateResult<RenderTemplate> {
    check_dimensions(&template)?;

    let RenderTemplate {
        output_format,
        width,
        height,
        elements,
        extra,
    } = template;

    Ok(RenderTemplate {
        output_format,
        width,
        height,
        elements: elements.into_iter().map(normalize_composition).collect(),
        extra,
    })
}

fn normalize_composition(composition: Composition) -> Composition {
    let mut seen_video = false;
    let elements = composition
        .elements
        .into_iter()
        .map(|element| match element {
            Element::Video(video) => {
                let time = if seen_video {
                    ElementTime::Auto
                } else {
                    ElementTime::Seconds(0.0)
                };
                seen_video = true;
                Element::Video(normalize_video(video, time))
            }
            Element::Audio(audio) => Element::Audio(normalize_audio(audio)),
            Element::Text(text) => Element::Text(normalize_text(text)),
            image @ Element::Image(_) => image,
        })
        .collect();

    Composition {
        elements,
        extra: composition.extra,
    }
}

fn normalize_video(video: VideoElement, time: ElementTime) -> VideoElement {
    VideoElement {
        track: Some(tracks::VIDEO),
        fit: Some("cover".to_string()),
        duration: None,
        volume: Some(0.0),
        time: Some(time),
        ..video
    }
}

fn normalize_audio(mut audio: AudioElement) -> AudioElement {
    let has_source = audio
        .source
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty());

    if !has_source {
        if let Some(text) = audio.text.take() {
            audio.source = Some(text);
        }
    }
    audio.track = Some(tracks::AUDIO);
    audio
}

fn normalize_text(text: TextElement) -> TextElement {
    TextElement {
        track: Some(tracks::TEXT),
        ..text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelgen_models::ImageElement;
    use serde_json::json;

    fn template(width: u32, height: u32, elements: Vec<Element>) -> RenderTemplate {
        RenderTemplate {
            width,
            height,
            ..RenderTemplate::portrait("mp4")
        }
        .with_composition(Composition::new(elements))
    }

    fn video(source: &str) -> Element {
        Element::Video(VideoElement {
            source: Some(source.to_string()),
            fit: Some("contain".to_string()),
            duration: Some(4.0),
            volume: Some(80.0),
            ..Default::default()
        })
    }

    fn videos(template: &RenderTemplate) -> Vec<&VideoElement> {
        template
            .iter_elements()
            .filter_map(|e| match e {
                Element::Video(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_landscape_rejected_before_normalization() {
        let input = template(1920, 1080, vec![video("a.mp4")]);
        let err = normalize_template(input).unwrap_err();
        assert_eq!(
            err,
            TemplateError::InvalidDimensions {
                width: 1920,
                height: 1080
            }
        );
    }

    #[test]
    fn test_video_fields_forced() {
        let out = normalize_template(template(1080, 1920, vec![video("a.mp4")])).unwrap();
        let v = videos(&out)[0];
        assert_eq!(v.fit.as_deref(), Some("cover"));
        assert_eq!(v.duration, None);
        assert_eq!(v.volume, Some(0.0));
        assert_eq!(v.track, Some(tracks::VIDEO));
        assert_eq!(v.source.as_deref(), Some("a.mp4"));
    }

    #[test]
    fn test_unreadable_video_fields_are_overwritten() {
        let input = RenderTemplate::from_value(json!({
            "output_format": "mp4",
            "width": 1080,
            "height": 1920,
            "elements": [{
                "type": "composition",
                "elements": [
                    {"type": "video", "source": "a.mp4", "duration": "auto", "volume": "auto"},
                    {"type": "video", "source": "b.mp4", "duration": "media", "fit": {"mode": "fill"}},
                    {"type": "video", "source": "c.mp4", "duration": "full", "time": "start"}
                ]
            }]
        }))
        .unwrap();
        assert!(videos(&input).iter().all(|v| v.duration.is_none()));

        let out = normalize_template(input).unwrap();
        for v in videos(&out) {
            assert_eq!(v.duration, None);
            assert_eq!(v.volume, Some(0.0));
            assert_eq!(v.fit.as_deref(), Some("cover"));
        }
        assert_eq!(videos(&out)[2].time, Some(ElementTime::Auto));
    }

    #[test]
    fn test_time_strategy_first_video_only() {
        let input = template(
            1080,
            1920,
            vec![
                Element::Audio(AudioElement::default()),
                video("a.mp4"),
                Element::Text(TextElement::default()),
                video("b.mp4"),
                video("c.mp4"),
            ],
        );
        let out = normalize_template(input).unwrap();
        let times: Vec<_> = videos(&out).iter().map(|v| v.time).collect();
        assert_eq!(
            times,
            vec![
                Some(ElementTime::Seconds(0.0)),
                Some(ElementTime::Auto),
                Some(ElementTime::Auto)
            ]
        );
    }

    #[test]
    fn test_time_strategy_resets_per_composition() {
        let input = RenderTemplate::portrait("mp4")
            .with_composition(Composition::new(vec![video("a.mp4"), video("b.mp4")]))
            .with_composition(Composition::new(vec![video("c.mp4")]));
        let out = normalize_template(input).unwrap();
        let first_of_second = match &out.elements[1].elements[0] {
            Element::Video(v) => v.time,
            _ => None,
        };
        assert_eq!(first_of_second, Some(ElementTime::Seconds(0.0)));
    }

    #[test]
    fn test_audio_text_moves_to_source() {
        let input = template(
            1080,
            1920,
            vec![Element::Audio(AudioElement {
                text: Some("Welcome to the tour".to_string()),
                ..Default::default()
            })],
        );
        let out = normalize_template(input).unwrap();
        let Element::Audio(audio) = &out.elements[0].elements[0] else {
            panic!("expected audio");
        };
        assert_eq!(audio.source.as_deref(), Some("Welcome to the tour"));
        assert!(audio.text.is_none());
        assert_eq!(audio.track, Some(tracks::AUDIO));
    }

    #[test]
    fn test_audio_with_source_keeps_text() {
        let input = template(
            1080,
            1920,
            vec![Element::Audio(AudioElement {
                source: Some("Narration".to_string()),
                text: Some("Other".to_string()),
                ..Default::default()
            })],
        );
        let out = normalize_template(input).unwrap();
        let Element::Audio(audio) = &out.elements[0].elements[0] else {
            panic!("expected audio");
        };
        assert_eq!(audio.source.as_deref(), Some("Narration"));
        assert_eq!(audio.text.as_deref(), Some("Other"));
    }

    #[test]
    fn test_images_untouched() {
        let image = Element::Image(ImageElement {
            source: Some("logo.png".to_string()),
            track: Some(7),
            ..Default::default()
        });
        let out = normalize_template(template(1080, 1920, vec![image.clone()])).unwrap();
        assert_eq!(out.elements[0].elements[0], image);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let input = RenderTemplate::from_value(json!({
            "output_format": "mp4",
            "width": 1080,
            "height": 1920,
            "elements": [{
                "type": "composition",
                "elements": [
                    {"type": "video", "source": "a.mp4", "volume": "50%"},
                    {"type": "video", "source": "b.mp4", "time": 3},
                    {"type": "audio", "text": "Hi"}
                ]
            }]
        }))
        .unwrap();

        let once = normalize_template(input).unwrap();
        let twice = normalize_template(once.clone()).unwrap();
        assert_eq!(once, twice);
    }
}
