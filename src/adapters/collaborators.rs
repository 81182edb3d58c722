use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::toml_config::{CollaboratorsConfig, EndpointConfig};
use crate::domain::model::{CargoHistoryItem, Metadata};
use crate::domain::ports::EnrichmentSource;
use crate::utils::error::Result;

/// Port metadata used whenever the port lookup cannot deliver.
pub fn fallback_port_metadata() -> Metadata {
    let mut metadata = Map::new();
    metadata.insert("portName".to_string(), json!("Unknown port"));
    metadata.insert("country".to_string(), json!("Unknown"));
    metadata.insert("facilities".to_string(), json!(["general cargo"]));
    metadata.insert(
        "cargoTypes".to_string(),
        json!(["general cargo", "containers", "bulk"]),
    );
    metadata
}

#[derive(Debug, Clone)]
struct Endpoint {
    url: String,
    headers: HashMap<String, String>,
}

impl Endpoint {
    fn resolve(base_url: &str, config: &EndpointConfig) -> Self {
        Self {
            url: format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                config.path.trim_start_matches('/')
            ),
            headers: config.headers.clone().unwrap_or_default(),
        }
    }

    fn post(&self, client: &Client, body: &Value) -> RequestBuilder {
        let mut request = client.post(&self.url).json(body);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }
        request
    }
}

/// The vessel, port and history lookups over HTTP POST.
#[derive(Debug, Clone)]
pub struct HttpCollaborators {
    client: Client,
    vessel: Endpoint,
    port: Endpoint,
    history: Endpoint,
}

impl HttpCollaborators {
    pub fn new(config: &CollaboratorsConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            vessel: Endpoint::resolve(&config.base_url, &config.vessel),
            port: Endpoint::resolve(&config.base_url, &config.port),
            history: Endpoint::resolve(&config.base_url, &config.history),
        })
    }

    /// Posts `body` and returns the status with the parsed JSON body, if any.
    async fn call(&self, endpoint: &Endpoint, body: &Value) -> reqwest::Result<(StatusCode, Option<Value>)> {
        tracing::debug!("Calling collaborator: {}", endpoint.url);
        let response = endpoint.post(&self.client, body).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Ok((status, None));
        }
        Ok((status, response.json::<Value>().await.ok()))
    }
}

#[async_trait]
impl EnrichmentSource for HttpCollaborators {
    async fn fetch_vessel_metadata(&self, imo: &str) -> Option<Metadata> {
        match self.call(&self.vessel, &json!({ "imo": imo })).await {
            Ok((StatusCode::OK, Some(Value::Object(metadata)))) => Some(metadata),
            Ok((StatusCode::NOT_FOUND, _)) => {
                tracing::warn!("No vessel details found for IMO {}", imo);
                None
            }
            Ok((status, _)) => {
                tracing::error!("Vessel lookup for IMO {} returned {}", imo, status);
                None
            }
            Err(e) => {
                tracing::error!("Error calling vessel lookup: {}", e);
                None
            }
        }
    }

    async fn fetch_port_metadata(&self, port_code: &str, berth_code: Option<&str>) -> Metadata {
        let mut body = json!({ "portCode": port_code });
        if let Some(berth) = berth_code {
            body["berthCode"] = json!(berth);
        }

        match self.call(&self.port, &body).await {
            Ok((StatusCode::OK, Some(Value::Object(metadata)))) => metadata,
            Ok((status, _)) => {
                tracing::warn!(
                    "Port lookup for {} (berth {:?}) returned {}, using fallback metadata",
                    port_code,
                    berth_code,
                    status
                );
                fallback_port_metadata()
            }
            Err(e) => {
                tracing::error!("Error calling port lookup: {}, using fallback metadata", e);
                fallback_port_metadata()
            }
        }
    }

    async fn fetch_historical_cargo(
        &self,
        imo: Option<&str>,
        port_code: Option<&str>,
        berth_code: Option<&str>,
    ) -> Option<Vec<CargoHistoryItem>> {
        let mut body = Map::new();
        for (key, value) in [("imo", imo), ("portCode", port_code), ("berthCode", berth_code)] {
            if let Some(value) = value {
                body.insert(key.to_string(), json!(value));
            }
        }

        match self.call(&self.history, &Value::Object(body)).await {
            Ok((StatusCode::OK, Some(payload))) => {
                let items = payload.get("cargoHistory")?;
                match serde_json::from_value::<Vec<CargoHistoryItem>>(items.clone()) {
                    Ok(items) => Some(items),
                    Err(e) => {
                        tracing::warn!("Malformed cargo history response: {}", e);
                        None
                    }
                }
            }
            Ok((status, _)) => {
                tracing::warn!(
                    "History lookup (imo {:?}, port {:?}) returned {}",
                    imo,
                    port_code,
                    status
                );
                None
            }
            Err(e) => {
                tracing::error!("Error calling history lookup: {}", e);
                None
            }
        }
    }
}
