use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::utils::error::PortcallError;

/// Accepts strings, numbers and booleans; `null` and other shapes become `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// One port call as delivered by the tracking feed. Every field may be missing or malformed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPortCallEvent {
    pub port_call_id: Option<Value>,
    #[serde(deserialize_with = "lenient_string")]
    pub port_call_timestamp: Option<String>,
    pub imo_lloyds: Option<Value>,
    #[serde(deserialize_with = "lenient_string")]
    pub mmsi: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub vessel_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub vessel_type_code: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub radio_call_sign: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub prev_port: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub port_to_visit: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub next_port: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub port_area_code: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub port_area_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub berth_code: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub berth_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub eta: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub ata: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub etd: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub atd: Option<String>,
    pub passengers_on_arrival: Option<Value>,
    pub passengers_on_departure: Option<Value>,
    pub crew_on_arrival: Option<Value>,
    pub crew_on_departure: Option<Value>,
    #[serde(deserialize_with = "lenient_string")]
    pub agent_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub shipping_company: Option<String>,
}

impl RawPortCallEvent {
    /// Builds an event from an arbitrary JSON value; non-objects yield an empty event.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(_) => Self::deserialize(value).unwrap_or_else(|e| {
                tracing::warn!("Port call event could not be read field by field: {}", e);
                Self::default()
            }),
            _ => Self::default(),
        }
    }
}

/// Kind of declaration the record is prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclarationType {
    /// Actual time of arrival (ATA).
    Arrival,
    /// Notice of arrival (NOA).
    NoticeOfArrival,
    /// Vessel information (VID).
    VesselInformation,
}

impl DeclarationType {
    pub fn code(&self) -> &'static str {
        match self {
            DeclarationType::Arrival => "ATA",
            DeclarationType::NoticeOfArrival => "NOA",
            DeclarationType::VesselInformation => "VID",
        }
    }

    pub fn is_arrival(&self) -> bool {
        matches!(self, DeclarationType::Arrival)
    }
}

impl fmt::Display for DeclarationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DeclarationType {
    type Err = PortcallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ATA" | "ARRIVAL" => Ok(DeclarationType::Arrival),
            "NOA" => Ok(DeclarationType::NoticeOfArrival),
            "VID" => Ok(DeclarationType::VesselInformation),
            other => Err(PortcallError::InvalidConfigValueError {
                field: "kind".to_string(),
                value: other.to_string(),
                reason: "expected one of ATA, NOA, VID".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub postcode: String,
    pub street: String,
    pub city: String,
    pub country: String,
    pub building: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declarant {
    pub id: String,
    pub name: String,
    pub role_code: String,
    pub contact: Contact,
    pub address: Address,
}

/// Canonical record handed to the regulatory XML builder.
///
/// Mandatory fields are always populated. `imo`, `passengers_on_arrival` and
/// `crew_on_arrival` exist only when they could be derived from the input and are
/// omitted from the serialized form otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclarationRecord {
    pub document_id: String,
    pub declaration_id: String,
    pub timestamp: String,
    pub call_id: String,
    pub remarks: String,
    pub arrival_datetime: String,
    pub location: String,
    pub call_datetime: String,
    pub anchorage_indicator: String,
    pub eta: Option<String>,
    pub etd: Option<String>,
    #[serde(rename = "portToVisit")]
    pub port_to_visit: String,
    #[serde(rename = "portAreaCode")]
    pub port_area_code: String,
    #[serde(rename = "portAreaName")]
    pub port_area_name: String,
    #[serde(rename = "berthCode")]
    pub berth_code: String,
    #[serde(rename = "berthName")]
    pub berth_name: String,
    #[serde(rename = "vesselName")]
    pub vessel_name: String,
    pub mmsi: Option<String>,
    #[serde(rename = "radioCallSign")]
    pub radio_call_sign: String,
    pub declarant: Declarant,
    #[serde(rename = "imoLloyds", skip_serializing_if = "Option::is_none", default)]
    pub imo: Option<u64>,
    #[serde(
        rename = "passengersOnArrival",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub passengers_on_arrival: Option<u32>,
    #[serde(
        rename = "crewOnArrival",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub crew_on_arrival: Option<u32>,
}

/// One historical cargo-mix entry: description and frequency percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CargoHistoryItem {
    #[serde(default = "unknown_cargo")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_percentage")]
    pub frequency: f64,
}

fn unknown_cargo() -> String {
    "Unknown cargo".to_string()
}

fn lenient_percentage<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

/// What a manifest generation run is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRequest {
    pub imo: String,
    pub port_to_visit: String,
    #[serde(default)]
    pub prev_port: Option<String>,
    #[serde(default)]
    pub berth_code: Option<String>,
}

pub type Metadata = Map<String, Value>;

/// Enrichment gathered before generation; lives for one orchestration call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentContext {
    pub vessel: Option<Metadata>,
    /// Always present: the lookup substitutes a fixed fallback set on failure.
    pub port: Metadata,
    pub vessel_history: Option<Vec<CargoHistoryItem>>,
    pub port_history: Option<Vec<CargoHistoryItem>>,
}

/// Result of a manifest generation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GeneratedManifest {
    /// Parsed output of the generation capability, with enrichment merged in.
    Structured(Value),
    /// The payload was not JSON; the raw text is kept for manual recovery.
    Degraded { generated_text: String, note: String },
}

impl GeneratedManifest {
    pub fn is_degraded(&self) -> bool {
        matches!(self, GeneratedManifest::Degraded { .. })
    }

    pub fn to_value(&self) -> Value {
        match self {
            GeneratedManifest::Structured(value) => value.clone(),
            GeneratedManifest::Degraded {
                generated_text,
                note,
            } => serde_json::json!({ "generated_text": generated_text, "note": note }),
        }
    }
}
