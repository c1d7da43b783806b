//! Lenient deserializers for fields written by a generative model.
//!
//! Model output routinely mixes `5`, `"5"` and `"5 s"` for the same field.
//! These helpers accept all of them and only reject values that carry no
//! usable number or text at all. The `forgiving_*` variants never reject:
//! they back fields that normalization overwrites anyway, so an unusable value
//! is dropped to `None` instead of failing the whole template.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::template::ElementTime;

/// Parse a loosely formatted number: `12`, `"12"`, `"12.5 s"`, `"40%"`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let numeric = trimmed
        .trim_end_matches('%')
        .trim_end_matches("px")
        .trim_end_matches('s')
        .trim();
    numeric.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// `Option<f64>` from a number, a numeric string, or null.
pub fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => parse_number(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("expected a number, got '{}'", s))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a number, got {}",
            other
        ))),
    }
}

/// `Option<u32>` from an integer, an integral float, a numeric string, or null.
pub fn opt_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match opt_f64(deserializer)? {
        None => Ok(None),
        Some(n) if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => Ok(Some(n as u32)),
        Some(n) => Err(serde::de::Error::custom(format!(
            "expected a non-negative integer, got {}",
            n
        ))),
    }
}

/// `Option<String>` from a string, a number, a bool, or null.
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string, got {}",
            other
        ))),
    }
}

/// Like [`opt_f64`], but unusable values become `None`.
pub fn forgiving_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match opt_f64(v.clone()) {
        Ok(n) => n,
        Err(e) => {
            debug!(value = %v, error = %e, "Dropping unusable numeric value");
            None
        }
    }))
}

/// Like [`opt_u32`], but unusable values become `None`.
pub fn forgiving_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match opt_u32(v.clone()) {
        Ok(n) => n,
        Err(e) => {
            debug!(value = %v, error = %e, "Dropping unusable integer value");
            None
        }
    }))
}

/// Like [`opt_string`], but unusable values become `None`.
pub fn forgiving_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match opt_string(v.clone()) {
        Ok(s) => s,
        Err(e) => {
            debug!(value = %v, error = %e, "Dropping unusable string value");
            None
        }
    }))
}

/// `Option<ElementTime>` that drops anything not a time.
pub fn forgiving_time<'de, D>(deserializer: D) -> Result<Option<ElementTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_null()).and_then(|v| {
        match serde_json::from_value::<ElementTime>(v.clone()) {
            Ok(time) => Some(time),
            Err(e) => {
                debug!(value = %v, error = %e, "Dropping unusable time value");
                None
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "opt_f64")]
        number: Option<f64>,
        #[serde(default, deserialize_with = "opt_u32")]
        track: Option<u32>,
        #[serde(default, deserialize_with = "opt_string")]
        label: Option<String>,
    }

    #[test]
    fn test_parse_number_variants() {
        assert_eq!(parse_number("6"), Some(6.0));
        assert_eq!(parse_number(" 6.5 s"), Some(6.5));
        assert_eq!(parse_number("40%"), Some(40.0));
        assert_eq!(parse_number("240 px"), Some(240.0));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn test_lenient_fields_accept_mixed_shapes() {
        let probe: Probe =
            serde_json::from_str(r#"{"number": "7.5", "track": 2.0, "label": 12}"#).unwrap();
        assert_eq!(probe.number, Some(7.5));
        assert_eq!(probe.track, Some(2));
        assert_eq!(probe.label.as_deref(), Some("12"));
    }

    #[test]
    fn test_lenient_fields_missing_and_null() {
        let probe: Probe = serde_json::from_str(r#"{"number": null}"#).unwrap();
        assert!(probe.number.is_none());
        assert!(probe.track.is_none());
        assert!(probe.label.is_none());
    }

    #[derive(Deserialize)]
    struct Forgiving {
        #[serde(default, deserialize_with = "forgiving_f64")]
        number: Option<f64>,
        #[serde(default, deserialize_with = "forgiving_u32")]
        track: Option<u32>,
        #[serde(default, deserialize_with = "forgiving_string")]
        label: Option<String>,
        #[serde(default, deserialize_with = "forgiving_time")]
        time: Option<ElementTime>,
    }

    #[test]
    fn test_forgiving_fields_drop_unusable_values() {
        let parsed: Forgiving = serde_json::from_str(
            r#"{"number": "media", "track": -1, "label": {"a": 1}, "time": "start"}"#,
        )
        .unwrap();
        assert!(parsed.number.is_none());
        assert!(parsed.track.is_none());
        assert!(parsed.label.is_none());
        assert!(parsed.time.is_none());
    }

    #[test]
    fn test_forgiving_fields_keep_usable_values() {
        let parsed: Forgiving =
            serde_json::from_str(r#"{"number": "2.5 s", "track": "3", "label": "cover", "time": "auto"}"#)
                .unwrap();
        assert_eq!(parsed.number, Some(2.5));
        assert_eq!(parsed.track, Some(3));
        assert_eq!(parsed.label.as_deref(), Some("cover"));
        assert_eq!(parsed.time, Some(ElementTime::Auto));
    }

    #[test]
    fn test_fractional_track_rejected() {
        let result: Result<Probe, _> = serde_json::from_str(r#"{"track": 1.5}"#);
        assert!(result.is_err());
    }
}
