use crate::domain::model::{CargoHistoryItem, Metadata};
use crate::utils::error::GenerationError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Json,
}

/// Payload sent to the generation capability.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub response_format: ResponseFormat,
}

impl CompletionRequest {
    pub fn json(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            response_format: ResponseFormat::Json,
        }
    }
}

/// Black-box text generation. Rate limiting must surface as `GenerationError::RateLimited`.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError>;
}

/// The three enrichment lookups. Implementations never fail: each applies its own
/// fallback policy and logs what went wrong.
#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    /// Absent when the vessel is unknown or the lookup failed.
    async fn fetch_vessel_metadata(&self, imo: &str) -> Option<Metadata>;

    /// Falls back to a fixed metadata set on any failure.
    async fn fetch_port_metadata(&self, port_code: &str, berth_code: Option<&str>) -> Metadata;

    /// Scoped by whichever identifiers are given; absent on any failure.
    async fn fetch_historical_cargo(
        &self,
        imo: Option<&str>,
        port_code: Option<&str>,
        berth_code: Option<&str>,
    ) -> Option<Vec<CargoHistoryItem>>;
}

pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
