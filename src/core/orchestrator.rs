use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::core::manifest::parse_generated;
use crate::core::prompt::{build_user_prompt, SYSTEM_PROMPT};
use crate::core::retry::{cancellable, RetryPolicy};
use crate::domain::model::{EnrichmentContext, GeneratedManifest, ManifestRequest};
use crate::domain::ports::{
    CompletionBackend, CompletionRequest, EnrichmentSource, Sleeper, TokioSleeper,
};
use crate::utils::error::{PortcallError, Result};

/// Switches for logging full prompts and raw responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromptLogging {
    pub log_prompts: bool,
    pub log_responses: bool,
}

/// Gathers enrichment from the collaborators and drives one generation call with
/// rate-limit backoff.
pub struct EnrichmentOrchestrator<E: EnrichmentSource, G: CompletionBackend, Z: Sleeper = TokioSleeper> {
    source: E,
    backend: G,
    sleeper: Z,
    policy: RetryPolicy,
    logging: PromptLogging,
}

impl<E: EnrichmentSource, G: CompletionBackend> EnrichmentOrchestrator<E, G, TokioSleeper> {
    pub fn new(source: E, backend: G, policy: RetryPolicy) -> Self {
        Self::with_sleeper(source, backend, policy, TokioSleeper)
    }
}

impl<E: EnrichmentSource, G: CompletionBackend, Z: Sleeper> EnrichmentOrchestrator<E, G, Z> {
    pub fn with_sleeper(source: E, backend: G, policy: RetryPolicy, sleeper: Z) -> Self {
        Self {
            source,
            backend,
            sleeper,
            policy,
            logging: PromptLogging::default(),
        }
    }

    pub fn with_logging(mut self, logging: PromptLogging) -> Self {
        self.logging = logging;
        self
    }

    /// Runs the four lookups in order. Collaborator failures degrade; only the
    /// token can abort.
    pub async fn assemble_context(
        &self,
        request: &ManifestRequest,
        cancel: &CancellationToken,
    ) -> Result<EnrichmentContext> {
        let berth = request.berth_code.as_deref();

        let vessel = cancellable(cancel, self.source.fetch_vessel_metadata(&request.imo))
            .await?
            .filter(|metadata| !metadata.is_empty());
        if vessel.is_none() {
            tracing::warn!("No vessel metadata for IMO {}", request.imo);
        }

        let port = cancellable(
            cancel,
            self.source.fetch_port_metadata(&request.port_to_visit, berth),
        )
        .await?;

        let vessel_history = cancellable(
            cancel,
            self.source.fetch_historical_cargo(Some(&request.imo), None, None),
        )
        .await?;

        let port_history = cancellable(
            cancel,
            self.source
                .fetch_historical_cargo(None, Some(&request.port_to_visit), berth),
        )
        .await?;

        tracing::info!(
            "📦 Enrichment for IMO {}: vessel={} vessel_history={} port_history={}",
            request.imo,
            vessel.is_some(),
            vessel_history.is_some(),
            port_history.is_some()
        );

        Ok(EnrichmentContext {
            vessel,
            port,
            vessel_history,
            port_history,
        })
    }

    pub async fn generate_manifest(
        &self,
        request: &ManifestRequest,
        cancel: &CancellationToken,
    ) -> Result<GeneratedManifest> {
        let context = self.assemble_context(request, cancel).await?;

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let completion = CompletionRequest::json(
            SYSTEM_PROMPT,
            build_user_prompt(request, &context, &today),
        );
        if self.logging.log_prompts {
            tracing::info!("System prompt: {}", completion.system_prompt);
            tracing::info!("User prompt: {}", completion.user_prompt);
        }

        let raw = self.complete_with_retry(&completion, cancel).await?;
        if self.logging.log_responses {
            tracing::info!("Raw generation response: {}", raw);
        }

        let manifest = parse_generated(&raw, context.vessel.as_ref(), &context.port);
        if manifest.is_degraded() {
            tracing::warn!("Returning unparsed manifest text for IMO {}", request.imo);
        }
        Ok(manifest)
    }

    /// Calls the backend until it succeeds, fails with something other than a
    /// rate limit, or the attempt budget runs out.
    pub async fn complete_with_retry(
        &self,
        completion: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            tracing::debug!("Generation attempt {}/{}", attempt, max_attempts);

            let error = match cancellable(cancel, self.backend.complete(completion)).await? {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };

            if !error.is_rate_limited() {
                tracing::error!("Generation failed on attempt {}: {}", attempt, error);
                return Err(PortcallError::GenerationFailed {
                    attempts: attempt,
                    source: error,
                });
            }

            if attempt >= max_attempts {
                tracing::error!("Max retries reached. Last error: {}", error);
                return Err(PortcallError::RetriesExhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay = self.policy.sample_delay(attempt);
            tracing::warn!(
                "Rate limit hit. Retrying in {:.2} seconds. Attempt {} of {}",
                delay.as_secs_f64(),
                attempt,
                max_attempts
            );
            cancellable(cancel, self.sleeper.sleep(delay)).await?;
        }
    }
}
