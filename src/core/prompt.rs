//! Renders the enrichment context into the text blocks of the generation prompt.
//!
//! Missing data is stated explicitly so the generation capability always sees a
//! complete context.

use serde_json::Value;

use crate::domain::model::{CargoHistoryItem, EnrichmentContext, ManifestRequest, Metadata};

pub const SYSTEM_PROMPT: &str = "You are a cargo data generator for maritime vessels. You will be given a \
vessel's IMO number, previous port of call, port to visit, and berth information, along with \
historical cargo data. Generate realistic cargo declaration data following the European Maritime \
Single Window environment (EMSWe) specification for Cargo Declaration at Arrival (CGA).

For the cargo details:
1. Generate realistic cargo details based on typical operations for the vessel with this IMO
2. Ensure the cargo aligns with both the vessel type and the port/berth's typical cargo handling capabilities
3. Include container details if applicable to typical vessels on this route
4. Include hazardous cargo information when applicable (with proper UN codes)
5. Use appropriate weights and descriptions that make sense for the route and vessel type

Format the response as a JSON object that can be used directly in a cargo declaration system.";

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn render_metadata(header: &str, metadata: &Metadata) -> String {
    let mut block = format!("{}\n", header);
    for (key, value) in metadata.iter().filter(|(_, v)| !v.is_null()) {
        block.push_str(&format!("- {}: {}\n", key, render_value(value)));
    }
    block
}

/// An empty mapping counts as no vessel details.
pub fn render_vessel_block(vessel: Option<&Metadata>) -> String {
    match vessel.filter(|metadata| !metadata.is_empty()) {
        Some(metadata) => render_metadata("Vessel details:", metadata),
        None => "Vessel details are not available.".to_string(),
    }
}

pub fn render_port_block(port: &Metadata) -> String {
    if port.is_empty() {
        return "Port and berth details are not available.".to_string();
    }
    render_metadata("Port and berth details:", port)
}

pub fn render_history_block(
    header: &str,
    missing: &str,
    history: Option<&[CargoHistoryItem]>,
) -> String {
    match history {
        Some(items) => {
            let mut block = format!("{}\n", header);
            for item in items {
                block.push_str(&format!("- {}: {}%\n", item.description, item.frequency));
            }
            block
        }
        None => missing.to_string(),
    }
}

pub fn build_user_prompt(request: &ManifestRequest, context: &EnrichmentContext, today: &str) -> String {
    let berth_text = request
        .berth_code
        .as_deref()
        .map(|berth| format!(" and berth {}", berth))
        .unwrap_or_default();
    let prev_port_text = match request.prev_port.as_deref() {
        Some(prev) => format!("coming from previous port {}", prev),
        None => "with unspecified previous port".to_string(),
    };

    let vessel_block = render_vessel_block(context.vessel.as_ref());
    let port_block = render_port_block(&context.port);
    let vessel_history = render_history_block(
        "Vessel's typical cargo:",
        "No historical cargo data available for this vessel.",
        context.vessel_history.as_deref(),
    );
    let port_history = render_history_block(
        "Port/berth's typical cargo handling:",
        "No historical cargo data available for this port/berth.",
        context.port_history.as_deref(),
    );

    format!(
        "Generate a complete cargo declaration for vessel with IMO number {imo} {prev_port_text} \
and arriving at port {port}{berth_text}.

{vessel_block}
{port_block}
{vessel_history}
{port_history}

Generate a realistic cargo manifest based on:
1. Transport Movement details (previous port: {prev}, port to visit: {port}, berth: {berth})
2. 1-10 cargo items with appropriate weights and descriptions depending on vessel type
3. Ensure cargo types match what this vessel typically carries AND what the port/berth typically handles
4. No unrealistic items for vessel type, for example oil tanker should not have containers
5. Container details if applicable
6. Hazardous cargo details if applicable
7. All required identifiers and codes according to EMSWe CGA specification
8. Do not add vessel details to the response, they are already provided above

Current date: {today}",
        imo = request.imo,
        port = request.port_to_visit,
        prev = request.prev_port.as_deref().unwrap_or("unknown"),
        berth = request.berth_code.as_deref().unwrap_or("unspecified"),
    )
}
