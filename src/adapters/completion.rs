use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::config::toml_config::GenerationConfig;
use crate::domain::ports::{CompletionBackend, CompletionRequest};
use crate::utils::error::{GenerationError, Result};

/// Length plus hash of an upstream body, so secrets echoed back never reach the logs.
fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

fn parse_retry_after(value: Option<&reqwest::header::HeaderValue>) -> Option<Duration> {
    value?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationBody<'a> {
    #[serde(flatten)]
    request: &'a CompletionRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Generation capability reached over HTTP POST.
#[derive(Clone, Debug)]
pub struct HttpCompletionClient {
    http_client: Client,
    endpoint: String,
    headers: HashMap<String, String>,
    model: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
}

impl HttpCompletionClient {
    pub fn new(config: &GenerationConfig, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            headers: config.headers.clone().unwrap_or_default(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> std::result::Result<String, GenerationError> {
        let body = GenerationBody {
            request,
            model: self.model.as_deref(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut builder = self.http_client.post(&self.endpoint).json(&body);
        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }

        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(response.headers().get(RETRY_AFTER));
            tracing::warn!(?retry_after, "Generation capability rate limited the request");
            return Err(GenerationError::RateLimited { retry_after });
        }

        let text = response.text().await?;
        if !status.is_success() {
            let body_summary = summarize_response_body(&text);
            tracing::error!(status = status.as_u16(), body_summary = %body_summary, "Generation API error");
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: format!("upstream error ({body_summary})"),
            });
        }

        if text.trim().is_empty() {
            tracing::warn!("Generation capability returned an empty body");
        }
        Ok(text)
    }
}
