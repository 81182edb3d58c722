//! Flattens the public port-call feed into [`RawPortCallEvent`]s.
//!
//! The feed nests agent, passenger/crew and berth details in arrays; only the
//! parts a declaration needs are lifted to the top level.

use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::time::Duration;

use crate::core::fields::coerce_integer;
use crate::domain::model::RawPortCallEvent;
use crate::utils::error::Result;

const AGENT_ROLE: i64 = 1;
const SHIPPING_COMPANY_ROLE: i64 = 2;

fn text(entry: &Map<String, Value>, key: &str) -> Option<String> {
    match entry.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn objects<'a>(entry: &'a Map<String, Value>, key: &str) -> impl Iterator<Item = &'a Map<String, Value>> {
    entry
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn flatten_entry(entry: &Map<String, Value>, port_call_id: u64) -> RawPortCallEvent {
    let mut event = RawPortCallEvent {
        port_call_id: Some(Value::from(port_call_id)),
        port_call_timestamp: text(entry, "portCallTimestamp"),
        imo_lloyds: entry.get("imoLloyds").cloned(),
        mmsi: text(entry, "mmsi"),
        vessel_name: text(entry, "vesselName"),
        vessel_type_code: text(entry, "vesselTypeCode"),
        radio_call_sign: text(entry, "radioCallSign"),
        prev_port: text(entry, "prevPort"),
        port_to_visit: text(entry, "portToVisit"),
        next_port: text(entry, "nextPort"),
        ..RawPortCallEvent::default()
    };

    for agent in objects(entry, "agentInfo") {
        match agent.get("role").and_then(Value::as_i64) {
            Some(AGENT_ROLE) => event.agent_name = text(agent, "name"),
            Some(SHIPPING_COMPANY_ROLE) => event.shipping_company = text(agent, "name"),
            _ => {}
        }
    }

    for info in objects(entry, "imoInformation") {
        let passengers = info.get("numberOfPassangers").filter(|v| !v.is_null()).cloned();
        let crew = info.get("numberOfCrew").filter(|v| !v.is_null()).cloned();
        match info.get("imoGeneralDeclaration").and_then(Value::as_str) {
            Some("Arrival") => {
                event.passengers_on_arrival = passengers;
                event.crew_on_arrival = crew;
            }
            Some("Departure") => {
                event.passengers_on_departure = passengers;
                event.crew_on_departure = crew;
            }
            _ => {}
        }
    }

    if let Some(area) = objects(entry, "portAreaDetails").next() {
        event.eta = text(area, "eta");
        event.ata = text(area, "ata");
        event.etd = text(area, "etd");
        event.atd = text(area, "atd");
        event.port_area_code = text(area, "portAreaCode");
        event.port_area_name = text(area, "portAreaName");
        event.berth_code = text(area, "berthCode");
        event.berth_name = text(area, "berthName");
    }

    event
}

/// Accepts `{"portCalls": [...]}` or a bare list. Entries without an integer-like
/// `portCallId` are skipped; when `tracked` is non-empty only those IMOs are kept.
pub fn extract_port_calls(payload: &Value, tracked: Option<&HashSet<u64>>) -> Vec<RawPortCallEvent> {
    let entries = match payload {
        Value::Object(map) => map.get("portCalls").and_then(Value::as_array),
        Value::Array(items) => Some(items),
        _ => None,
    };
    let Some(entries) = entries else {
        tracing::error!("Expected a list of port calls in the feed payload");
        return Vec::new();
    };

    let tracked = tracked.filter(|set| !set.is_empty());
    match tracked {
        Some(set) => tracing::info!("Tracking only these vessels: {:?}", set),
        None => tracing::info!("Tracking all vessels"),
    }

    let mut events = Vec::new();
    for entry in entries {
        let Some(entry) = entry.as_object() else {
            continue;
        };
        let Some(port_call_id) = entry.get("portCallId").and_then(coerce_integer) else {
            tracing::warn!("Skipping entry with invalid portCallId {:?}", entry.get("portCallId"));
            continue;
        };

        if let Some(set) = tracked {
            let imo = entry.get("imoLloyds").and_then(coerce_integer);
            if !imo.is_some_and(|imo| set.contains(&imo)) {
                continue;
            }
            tracing::info!("Processing vessel {:?} with portCallId {}", imo, port_call_id);
        }

        events.push(flatten_entry(entry, port_call_id));
    }

    tracing::info!("Processed {} port call records", events.len());
    events
}

/// Client for the public port-call feed.
pub struct PortCallFeed {
    client: Client,
    endpoint: String,
}

impl PortCallFeed {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.into(),
        })
    }

    pub async fn fetch(&self) -> Result<Value> {
        tracing::debug!("Making API request to: {}", self.endpoint);
        let response = self
            .client
            .get(&self.endpoint)
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    pub async fn fetch_port_calls(&self, tracked: Option<&HashSet<u64>>) -> Result<Vec<RawPortCallEvent>> {
        let payload = self.fetch().await?;
        Ok(extract_port_calls(&payload, tracked))
    }
}
