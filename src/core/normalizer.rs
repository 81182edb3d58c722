use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::core::fields::{
    assemble_destination, format_utc, normalize_datetime, normalize_port_code, present,
    sanitize_count, sanitize_imo,
};
use crate::domain::model::{
    Address, Contact, Declarant, DeclarationRecord, DeclarationType, RawPortCallEvent,
};
use crate::utils::error::{PortcallError, Result};
use crate::utils::validation::Validate;

const DECLARANT_COUNTRY: &str = "FI";
const FALLBACK_DECLARANT_ID: &str = "FI123456789012";
const FALLBACK_AGENT_NAME: &str = "Unknown Agent";
const FALLBACK_CONTACT_NAME: &str = "Port Agent";
const FALLBACK_LOCATION: &str = "UNKNW";
const AGENT_ROLE_CODE: &str = "AG";
const UNKNOWN_CALL_ID: &str = "unknown";

/// Normalizes one port call into a declaration record. Never fails.
pub fn normalize(raw: &RawPortCallEvent, kind: DeclarationType) -> DeclarationRecord {
    normalize_at(raw, kind, Utc::now())
}

/// Same as [`normalize`] with an explicit clock.
pub fn normalize_at(
    raw: &RawPortCallEvent,
    kind: DeclarationType,
    now: DateTime<Utc>,
) -> DeclarationRecord {
    match try_normalize(raw, kind, now) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(
                "Falling back to minimal {} record for vessel {:?}: {}",
                kind,
                raw.vessel_name,
                e
            );
            build_minimal_fallback(raw, now)
        }
    }
}

fn try_normalize(
    raw: &RawPortCallEvent,
    kind: DeclarationType,
    now: DateTime<Utc>,
) -> Result<DeclarationRecord> {
    let call_id = port_call_id(raw.port_call_id.as_ref());
    let location = normalize_port_code(raw.port_to_visit.as_deref())?;

    let imo = sanitize_imo(raw.imo_lloyds.as_ref());
    let eta = normalize_datetime(raw.eta.as_deref());
    let etd = normalize_datetime(raw.etd.as_deref());
    let ata = normalize_datetime(raw.ata.as_deref());
    let passengers_on_arrival = sanitize_count(raw.passengers_on_arrival.as_ref());
    let crew_on_arrival = sanitize_count(raw.crew_on_arrival.as_ref());

    tracing::debug!(
        "Normalizing port call {} ({}): imo={:?} eta={:?} passengers={:?} crew={:?}",
        call_id,
        kind,
        imo,
        eta,
        passengers_on_arrival,
        crew_on_arrival
    );

    let vessel_name = raw.vessel_name.clone().unwrap_or_else(|| "unknown".to_string());
    let destination = assemble_destination(
        &location,
        raw.port_area_name.as_deref(),
        raw.berth_name.as_deref(),
    );
    let remarks = build_remarks(&vessel_name, imo, kind, &destination);

    let now_text = format_utc(now);
    let arrival_datetime = ata.clone().or_else(|| eta.clone()).unwrap_or_else(|| now_text.clone());
    let call_datetime = ata.or_else(|| eta.clone()).unwrap_or_else(|| now_text.clone());

    let record = DeclarationRecord {
        document_id: format!("MSGID-{}", call_id),
        declaration_id: format!("DECL-PT-{}", call_id),
        timestamp: now_text,
        call_id,
        remarks,
        arrival_datetime,
        location: location.clone(),
        call_datetime,
        anchorage_indicator: "0".to_string(),
        eta,
        etd,
        port_to_visit: location,
        port_area_code: raw.port_area_code.clone().unwrap_or_default(),
        port_area_name: raw.port_area_name.clone().unwrap_or_default(),
        berth_code: raw.berth_code.clone().unwrap_or_default(),
        berth_name: raw.berth_name.clone().unwrap_or_default(),
        vessel_name,
        mmsi: raw.mmsi.clone(),
        radio_call_sign: raw.radio_call_sign.clone().unwrap_or_default(),
        declarant: build_declarant(raw, imo),
        imo,
        passengers_on_arrival,
        crew_on_arrival,
    };

    record.validate()?;
    Ok(record)
}

/// The feed id, or `"unknown"` when the event carries none.
fn port_call_id(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => {
            tracing::debug!("Port call has no usable portCallId, using '{}'", UNKNOWN_CALL_ID);
            UNKNOWN_CALL_ID.to_string()
        }
    }
}

fn build_remarks(
    vessel_name: &str,
    imo: Option<u64>,
    kind: DeclarationType,
    destination: &str,
) -> String {
    let mut remarks = vessel_name.to_string();
    if let Some(imo) = imo {
        remarks.push_str(&format!(" (IMO: {})", imo));
    }
    let arrow = if kind.is_arrival() { "port arrival ->" } else { "->" };
    remarks.push_str(&format!(" {} {}", arrow, destination));
    remarks
}

fn build_declarant(raw: &RawPortCallEvent, imo: Option<u64>) -> Declarant {
    let agent = present(raw.agent_name.as_deref());
    let company = present(raw.shipping_company.as_deref());

    Declarant {
        id: imo
            .map(|imo| format!("{}{}", DECLARANT_COUNTRY, imo))
            .unwrap_or_else(|| FALLBACK_DECLARANT_ID.to_string()),
        name: agent.or(company).unwrap_or(FALLBACK_AGENT_NAME).to_string(),
        role_code: AGENT_ROLE_CODE.to_string(),
        contact: sentinel_contact(agent),
        address: sentinel_address(),
    }
}

// The feed carries no declarant contact or address details.
fn sentinel_contact(agent: Option<&str>) -> Contact {
    Contact {
        name: agent.unwrap_or(FALLBACK_CONTACT_NAME).to_string(),
        phone: "+358-00-0000000".to_string(),
        email: "contact@example.com".to_string(),
    }
}

fn sentinel_address() -> Address {
    Address {
        postcode: "00000".to_string(),
        street: "Port Street".to_string(),
        city: "Port City".to_string(),
        country: DECLARANT_COUNTRY.to_string(),
        building: "1".to_string(),
    }
}

/// Guaranteed-valid record built from nothing but the clock, keeping the vessel
/// name, MMSI and radio call sign that were present in `raw`.
pub fn build_minimal_fallback(raw: &RawPortCallEvent, now: DateTime<Utc>) -> DeclarationRecord {
    let now_text = format_utc(now);

    DeclarationRecord {
        document_id: format!("MSGID-{}", now.timestamp()),
        declaration_id: format!("DECL-PT-{}", now.format("%y%m%d%H%M")),
        timestamp: now_text.clone(),
        call_id: format!("CALL-{}-001", now.format("%Y%m%d")),
        remarks: "Adapted from port call feed data".to_string(),
        arrival_datetime: now_text.clone(),
        location: FALLBACK_LOCATION.to_string(),
        call_datetime: now_text.clone(),
        anchorage_indicator: "0".to_string(),
        eta: Some(
            present(raw.eta.as_deref())
                .map(str::to_string)
                .unwrap_or_else(|| now_text.clone()),
        ),
        etd: None,
        port_to_visit: "PORTX".to_string(),
        port_area_code: String::new(),
        port_area_name: "Unknown Area".to_string(),
        berth_code: String::new(),
        berth_name: "Unknown Berth".to_string(),
        vessel_name: raw
            .vessel_name
            .clone()
            .unwrap_or_else(|| "Unknown Vessel".to_string()),
        mmsi: raw.mmsi.clone(),
        radio_call_sign: raw.radio_call_sign.clone().unwrap_or_default(),
        declarant: Declarant {
            id: FALLBACK_DECLARANT_ID.to_string(),
            name: FALLBACK_AGENT_NAME.to_string(),
            role_code: AGENT_ROLE_CODE.to_string(),
            contact: sentinel_contact(None),
            address: sentinel_address(),
        },
        imo: None,
        passengers_on_arrival: None,
        crew_on_arrival: None,
    }
}

impl Validate for DeclarationRecord {
    fn validate(&self) -> Result<()> {
        let mandatory = [
            ("document_id", &self.document_id),
            ("declaration_id", &self.declaration_id),
            ("timestamp", &self.timestamp),
            ("call_id", &self.call_id),
            ("remarks", &self.remarks),
            ("arrival_datetime", &self.arrival_datetime),
            ("call_datetime", &self.call_datetime),
            ("anchorage_indicator", &self.anchorage_indicator),
            ("declarant.id", &self.declarant.id),
            ("declarant.name", &self.declarant.name),
            ("declarant.role_code", &self.declarant.role_code),
        ];
        if let Some((field, _)) = mandatory.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(PortcallError::ValidationError {
                message: format!("mandatory field '{}' is empty", field),
            });
        }

        if self.location.chars().count() != 5 {
            return Err(PortcallError::ValidationError {
                message: format!("location '{}' must be 5 characters", self.location),
            });
        }
        Ok(())
    }
}
