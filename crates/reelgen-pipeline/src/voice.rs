//! Voice identity reconciliation for narration elements.
//!
//! A provider string is a space-delimited list of tokens, e.g.
//! `elevenlabs model_id=eleven_multilingual_v2 voice_id=abc`. The voice is
//! global per request, so every audio element in every composition is brought
//! in line with the configured voice id.

use reelgen_models::{Element, RenderTemplate};
use tracing::debug;

pub const DEFAULT_TTS_ENGINE: &str = "elevenlabs";
const VOICE_KEY: &str = "voice_id";

/// What reconciliation did to one provider string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderChange {
    Unchanged,
    Synthesized,
    Appended,
    Replaced,
}

/// Value of the first `key=value` token in a provider string.
pub fn provider_token<'a>(provider: &'a str, key: &str) -> Option<&'a str> {
    provider.split_whitespace().find_map(|token| {
        token
            .split_once('=')
            .filter(|(k, _)| *k == key)
            .map(|(_, v)| v)
    })
}

/// Provider string for a narration element with none.
pub fn default_provider(model_id: &str, voice_id: &str) -> String {
    format!(
        "{} model_id={} {}={}",
        DEFAULT_TTS_ENGINE, model_id, VOICE_KEY, voice_id
    )
}

/// Bring one provider string in line with `voice_id`.
///
/// Tokens other than `voice_id` keep their value and position.
pub fn reconcile_provider(
    provider: Option<&str>,
    voice_id: &str,
    default_model: &str,
) -> (String, ProviderChange) {
    let Some(provider) = provider.map(str::trim).filter(|p| !p.is_empty()) else {
        return (
            default_provider(default_model, voice_id),
            ProviderChange::Synthesized,
        );
    };

    match provider_token(provider, VOICE_KEY) {
        Some(current) if current == voice_id => (provider.to_string(), ProviderChange::Unchanged),
        Some(_) => {
            let rewritten: Vec<String> = provider
                .split_whitespace()
                .map(|token| match token.split_once('=') {
                    Some((key, _)) if key == VOICE_KEY => format!("{}={}", VOICE_KEY, voice_id),
                    _ => token.to_string(),
                })
                .collect();
            (rewritten.join(" "), ProviderChange::Replaced)
        }
        None => (
            format!("{} {}={}", provider, VOICE_KEY, voice_id),
            ProviderChange::Appended,
        ),
    }
}

/// Apply `voice_id` to every audio element. No-op when it is absent or blank.
pub fn reconcile_voices(
    mut template: RenderTemplate,
    voice_id: Option<&str>,
    default_model: &str,
) -> RenderTemplate {
    let Some(voice_id) = voice_id.map(str::trim).filter(|v| !v.is_empty()) else {
        return template;
    };

    let mut changed = 0;
    for composition in template.elements.iter_mut() {
        for element in composition.elements.iter_mut() {
            let Element::Audio(audio) = element else {
                continue;
            };
            let (provider, change) =
                reconcile_provider(audio.provider.as_deref(), voice_id, default_model);
            if change != ProviderChange::Unchanged {
                changed += 1;
                audio.provider = Some(provider);
            }
        }
    }

    if changed > 0 {
        debug!(changed, voice_id = %voice_id, "Reconciled narration voices");
    }
    template
}
