use serde_json::Value;

use crate::domain::model::{GeneratedManifest, Metadata};

/// Keys under which generated output may already carry vessel information.
pub const VESSEL_INFO_KEYS: [&str; 2] = ["vesselDetails", "vesselInformation"];

/// Nesting deeper than this is not searched.
pub const MAX_SEARCH_DEPTH: usize = 32;

pub const UNPARSED_NOTE: &str =
    "Response could not be parsed as JSON. Please format the text into proper JSON structure.";

pub const EMPTY_NOTE: &str = "Empty response from the generation service.";

/// Looks for a vessel-information key in `value` and in every nested mapping.
pub fn has_vessel_info(value: &Value) -> bool {
    search_vessel_info(value, 0)
}

fn search_vessel_info(value: &Value, depth: usize) -> bool {
    if depth > MAX_SEARCH_DEPTH {
        return false;
    }
    let Value::Object(map) = value else {
        return false;
    };
    if VESSEL_INFO_KEYS.iter().any(|key| map.contains_key(*key)) {
        return true;
    }
    map.values()
        .filter(|v| v.is_object())
        .any(|v| search_vessel_info(v, depth + 1))
}

/// Adds `vesselDetails` unless the output already has vessel information anywhere,
/// and always (re)writes `portDetails`.
pub fn merge_enrichment(mut parsed: Value, vessel: Option<&Metadata>, port: &Metadata) -> Value {
    let vessel_present = has_vessel_info(&parsed);
    if let Value::Object(map) = &mut parsed {
        let details: Option<Metadata> = vessel
            .map(|vessel| {
                vessel
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<Metadata>()
            })
            .filter(|details| !details.is_empty());
        if let Some(details) = details {
            if vessel_present {
                tracing::debug!("Generated manifest already carries vessel information, keeping it");
            } else {
                map.insert("vesselDetails".to_string(), Value::Object(details));
            }
        }
        map.insert("portDetails".to_string(), Value::Object(port.clone()));
    }
    parsed
}

/// Parses the generation payload and merges enrichment, or degrades to raw text.
pub fn parse_generated(raw: &str, vessel: Option<&Metadata>, port: &Metadata) -> GeneratedManifest {
    if raw.trim().is_empty() {
        tracing::error!("Generated manifest is empty");
        return GeneratedManifest::Degraded {
            generated_text: raw.to_string(),
            note: EMPTY_NOTE.to_string(),
        };
    }
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(parsed) => GeneratedManifest::Structured(merge_enrichment(parsed, vessel, port)),
        Err(e) => {
            tracing::error!("Failed to parse generated manifest as JSON: {}", e);
            GeneratedManifest::Degraded {
                generated_text: raw.to_string(),
                note: UNPARSED_NOTE.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(value: Value) -> Metadata {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_has_vessel_info_at_any_depth() {
        assert!(has_vessel_info(&json!({"vesselDetails": {}})));
        assert!(has_vessel_info(&json!({"cga": {"movement": {"vesselInformation": {"name": "X"}}}})));
        assert!(!has_vessel_info(&json!({"cargoItems": [{"vesselDetails": {}}]})));
        assert!(!has_vessel_info(&json!([{"vesselDetails": {}}])));
        assert!(!has_vessel_info(&json!({"vessel": "Viking Glory"})));
    }

    #[test]
    fn test_search_depth_is_capped() {
        let mut nested = json!({"vesselDetails": {}});
        for _ in 0..(MAX_SEARCH_DEPTH + 5) {
            nested = json!({ "level": nested });
        }
        assert!(!has_vessel_info(&nested));

        let mut shallow = json!({"vesselDetails": {}});
        for _ in 0..5 {
            shallow = json!({ "level": shallow });
        }
        assert!(has_vessel_info(&shallow));
    }

    #[test]
    fn test_merge_keeps_existing_vessel_info() {
        let parsed = json!({"declaration": {"vesselInformation": {"name": "From model"}}});
        let vessel = metadata(json!({"name": "From lookup"}));
        let port = metadata(json!({"portName": "Turku"}));

        let merged = merge_enrichment(parsed, Some(&vessel), &port);
        assert_eq!(merged["declaration"]["vesselInformation"]["name"], "From model");
        assert!(merged.get("vesselDetails").is_none());
        assert_eq!(merged["portDetails"]["portName"], "Turku");
    }

    #[test]
    fn test_merge_adds_vessel_details_without_nulls_and_overwrites_port() {
        let parsed = json!({"cargoItems": [], "portDetails": {"portName": "From model"}});
        let vessel = metadata(json!({"name": "Viking Glory", "flag": null}));
        let port = metadata(json!({"portName": "Turku"}));

        let merged = merge_enrichment(parsed, Some(&vessel), &port);
        assert_eq!(merged["vesselDetails"], json!({"name": "Viking Glory"}));
        assert_eq!(merged["portDetails"], json!({"portName": "Turku"}));
    }

    #[test]
    fn test_empty_vessel_metadata_is_not_merged() {
        let port = metadata(json!({"portName": "Turku"}));
        let merged = merge_enrichment(json!({"cargoItems": []}), Some(&Metadata::new()), &port);
        assert!(merged.get("vesselDetails").is_none());

        let only_nulls = metadata(json!({"flag": null}));
        let merged = merge_enrichment(json!({"cargoItems": []}), Some(&only_nulls), &port);
        assert!(merged.get("vesselDetails").is_none());
    }

    #[test]
    fn test_merge_leaves_non_objects_alone() {
        let port = metadata(json!({"portName": "Turku"}));
        assert_eq!(merge_enrichment(json!([1, 2]), None, &port), json!([1, 2]));
    }

    #[test]
    fn test_parse_failure_degrades() {
        let port = metadata(json!({}));
        let manifest = parse_generated("Here is your manifest: {oops", None, &port);
        assert_eq!(
            manifest,
            GeneratedManifest::Degraded {
                generated_text: "Here is your manifest: {oops".to_string(),
                note: UNPARSED_NOTE.to_string(),
            }
        );
        assert_eq!(
            parse_generated("  ", None, &port),
            GeneratedManifest::Degraded {
                generated_text: "  ".to_string(),
                note: EMPTY_NOTE.to_string(),
            }
        );
    }
}
