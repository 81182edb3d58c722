//! Field-level normalization shared by the declaration normalizer and the feed extractor.
//!
//! Every helper is total: malformed input yields `None` (omit the field), the raw
//! value (pass it through), or an error the caller turns into a fallback record.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::utils::error::{PortcallError, Result};

/// Output shape for every timestamp in a declaration record.
pub const UTC_SECONDS_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Lowercased values the feed uses for "no data".
const PLACEHOLDERS: [&str; 3] = ["unknown", "ei tiedossa", ""];

pub fn format_utc(now: DateTime<Utc>) -> String {
    now.format(UTC_SECONDS_FORMAT).to_string()
}

/// Coerces a JSON scalar into a non-negative integer.
///
/// Integral floats and integer strings are accepted; anything else is `None`.
pub fn coerce_integer(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<u64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            })
        }
        _ => None,
    }
}

/// `0`, `"0"` and `"unknown"` mean the vessel has no IMO number on record.
pub fn sanitize_imo(value: Option<&Value>) -> Option<u64> {
    let value = value?;
    if let Value::String(s) = value {
        if s.trim().eq_ignore_ascii_case("unknown") {
            return None;
        }
    }

    match coerce_integer(value) {
        Some(0) | None => {
            if !value.is_null() {
                tracing::debug!("IMO value {} treated as not present", value);
            }
            None
        }
        Some(imo) => Some(imo),
    }
}

/// Passenger and crew counts. Absent and `0` are different facts, so a value that
/// cannot be coerced is dropped rather than defaulted.
pub fn sanitize_count(value: Option<&Value>) -> Option<u32> {
    let value = value?;
    let count = coerce_integer(value).and_then(|n| u32::try_from(n).ok());
    if count.is_none() && !value.is_null() {
        tracing::debug!("Count value {} could not be coerced, omitting", value);
    }
    count
}

/// Re-emits a feed timestamp as `YYYY-MM-DDTHH:MM:SSZ`.
///
/// Accepts `+HH:MM` offsets, a trailing `Z`, or no zone, each with optional
/// fractional seconds. The zone is stripped and the wall-clock digits are kept as
/// UTC without conversion. Unparseable input is returned unchanged; empty input is `None`.
pub fn normalize_datetime(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    if raw.is_empty() {
        return None;
    }

    match parse_feed_datetime(raw) {
        Some(parsed) => Some(parsed.format(UTC_SECONDS_FORMAT).to_string()),
        None => {
            tracing::warn!("Could not normalize timestamp '{}', using original value", raw);
            Some(raw.to_string())
        }
    }
}

fn parse_feed_datetime(raw: &str) -> Option<NaiveDateTime> {
    let stripped = if raw.contains('+') {
        raw.split('+').next().unwrap_or_default().to_string()
    } else if raw.contains('Z') {
        raw.replace('Z', "")
    } else {
        raw.to_string()
    };

    let format = if stripped.contains('.') {
        "%Y-%m-%dT%H:%M:%S%.f"
    } else {
        "%Y-%m-%dT%H:%M:%S"
    };
    NaiveDateTime::parse_from_str(&stripped, format).ok()
}

pub fn is_placeholder(value: &str) -> bool {
    let lowered = value.to_lowercase();
    PLACEHOLDERS.contains(&lowered.trim())
}

/// `port[/area][/berth]`, dropping area and berth names that are placeholders.
pub fn assemble_destination(
    port_to_visit: &str,
    port_area_name: Option<&str>,
    berth_name: Option<&str>,
) -> String {
    let mut parts = vec![port_to_visit];
    parts.extend(
        [port_area_name, berth_name]
            .into_iter()
            .flatten()
            .filter(|name| !is_placeholder(name)),
    );
    parts.join("/")
}

/// Five-character location code (UN/LOCODE shape), uppercased.
pub fn normalize_port_code(raw: Option<&str>) -> Result<String> {
    let code = raw.map(|c| c.trim().to_ascii_uppercase()).unwrap_or_default();
    if code.len() == 5 && code.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(code)
    } else {
        Err(PortcallError::ValidationError {
            message: format!("port code '{}' is not a 5-character location code", code),
        })
    }
}

/// Non-empty trimmed text, or `None`.
pub fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_imo_sentinels() {
        assert_eq!(sanitize_imo(Some(&json!(0))), None);
        assert_eq!(sanitize_imo(Some(&json!("0"))), None);
        assert_eq!(sanitize_imo(Some(&json!("unknown"))), None);
        assert_eq!(sanitize_imo(Some(&json!("Unknown"))), None);
        assert_eq!(sanitize_imo(Some(&Value::Null)), None);
        assert_eq!(sanitize_imo(None), None);
    }

    #[test]
    fn test_sanitize_imo_numeric_like() {
        assert_eq!(sanitize_imo(Some(&json!(9876543))), Some(9876543));
        assert_eq!(sanitize_imo(Some(&json!("9876543"))), Some(9876543));
        assert_eq!(sanitize_imo(Some(&json!(" 9876543 "))), Some(9876543));
        assert_eq!(sanitize_imo(Some(&json!(9876543.0))), Some(9876543));
        assert_eq!(sanitize_imo(Some(&json!("IMO9876543"))), None);
    }

    #[test]
    fn test_sanitize_count_keeps_zero() {
        assert_eq!(sanitize_count(Some(&json!(0))), Some(0));
        assert_eq!(sanitize_count(Some(&json!("0"))), Some(0));
        assert_eq!(sanitize_count(Some(&json!(250))), Some(250));
        assert_eq!(sanitize_count(Some(&json!("17"))), Some(17));
    }

    #[test]
    fn test_sanitize_count_omits_unusable_values() {
        assert_eq!(sanitize_count(None), None);
        assert_eq!(sanitize_count(Some(&Value::Null)), None);
        assert_eq!(sanitize_count(Some(&json!("many"))), None);
        assert_eq!(sanitize_count(Some(&json!(-3))), None);
        assert_eq!(sanitize_count(Some(&json!(2.5))), None);
        assert_eq!(sanitize_count(Some(&json!([1]))), None);
    }

    #[test]
    fn test_normalize_datetime_shapes() {
        assert_eq!(
            normalize_datetime(Some("2024-03-01T08:30:00+02:00")).as_deref(),
            Some("2024-03-01T08:30:00Z")
        );
        assert_eq!(
            normalize_datetime(Some("2024-03-01T08:30:00.123+00:00")).as_deref(),
            Some("2024-03-01T08:30:00Z")
        );
        assert_eq!(
            normalize_datetime(Some("2024-03-01T08:30:00.000Z")).as_deref(),
            Some("2024-03-01T08:30:00Z")
        );
        assert_eq!(
            normalize_datetime(Some("2024-03-01T08:30:00Z")).as_deref(),
            Some("2024-03-01T08:30:00Z")
        );
        assert_eq!(
            normalize_datetime(Some("2024-03-01T08:30:00")).as_deref(),
            Some("2024-03-01T08:30:00Z")
        );
        assert_eq!(
            normalize_datetime(Some("2024-03-01T08:30:00.5")).as_deref(),
            Some("2024-03-01T08:30:00Z")
        );
    }

    #[test]
    fn test_normalize_datetime_passthrough_and_empty() {
        assert_eq!(normalize_datetime(None), None);
        assert_eq!(normalize_datetime(Some("")), None);
        assert_eq!(
            normalize_datetime(Some("next tuesday")).as_deref(),
            Some("next tuesday")
        );
        // Negative offsets are not stripped and therefore pass through unchanged.
        assert_eq!(
            normalize_datetime(Some("2024-03-01T08:30:00-05:00")).as_deref(),
            Some("2024-03-01T08:30:00-05:00")
        );
    }

    #[test]
    fn test_assemble_destination_drops_placeholders() {
        assert_eq!(
            assemble_destination("FITKU", Some("Ei tiedossa"), Some("viking1")),
            "FITKU/viking1"
        );
        assert_eq!(
            assemble_destination("FIHEL", Some("Länsisatama"), Some("LJ7")),
            "FIHEL/Länsisatama/LJ7"
        );
        assert_eq!(
            assemble_destination("FIHEL", Some("UNKNOWN"), Some("")),
            "FIHEL"
        );
        assert_eq!(assemble_destination("FIHEL", None, None), "FIHEL");
    }

    #[test]
    fn test_normalize_port_code() {
        assert_eq!(normalize_port_code(Some(" fitku ")).unwrap(), "FITKU");
        assert!(normalize_port_code(Some("TKU")).is_err());
        assert!(normalize_port_code(Some("FI-TK")).is_err());
        assert!(normalize_port_code(None).is_err());
    }
}
