use clap::Parser;
use portcall_etl::config::cli::{read_json, write_json, Command};
use portcall_etl::config::toml_config::FeedConfig;
use portcall_etl::core::feed::{extract_port_calls, PortCallFeed};
use portcall_etl::domain::model::{DeclarationType, RawPortCallEvent};
use portcall_etl::utils::error::{ErrorSeverity, PortcallError, Result};
use portcall_etl::utils::{logger, validation::Validate};
use portcall_etl::{
    normalize, CliConfig, EnrichmentOrchestrator, HttpCollaborators, HttpCompletionClient,
    PromptLogging, ServiceConfig,
};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const FEED_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting portcall-etl CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let result = match &config.command {
        Command::Normalize {
            input,
            kind,
            output,
        } => run_normalize(input, *kind, output.as_deref()),
        Command::Feed {
            input,
            config: config_path,
            endpoint,
            kind,
            output,
            ..
        } => {
            let tracked = config.command.tracked_vessels();
            run_feed(
                input.as_deref(),
                config_path.as_deref(),
                endpoint.as_deref(),
                tracked,
                *kind,
                output.as_deref(),
            )
            .await
        }
        Command::Manifest {
            config: config_path,
            timeout_seconds,
            output,
            ..
        } => match config.command.manifest_request() {
            Some(request) => {
                run_manifest(config_path.as_deref(), request, *timeout_seconds, output.as_deref()).await
            }
            None => Ok(()),
        },
    };

    if let Err(e) = result {
        tracing::error!("❌ Run failed: {} (Severity: {:?})", e, e.severity());
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        // 取消的執行一律以 130 結束
        let exit_code = match (&e, e.severity()) {
            (PortcallError::Cancelled, _) => 130,
            (_, ErrorSeverity::Low) => 0,
            (_, ErrorSeverity::Medium) => 2, // 可重試錯誤
            (_, ErrorSeverity::High) => 1,   // 處理錯誤
            (_, ErrorSeverity::Critical) => 3, // 系統錯誤
        };

        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

/// Accepts a single event object or a list of them.
fn events_from(value: &Value) -> Vec<RawPortCallEvent> {
    match value {
        Value::Array(items) => items.iter().map(RawPortCallEvent::from_value).collect(),
        other => vec![RawPortCallEvent::from_value(other)],
    }
}

fn run_normalize(input: &Path, kind: DeclarationType, output: Option<&Path>) -> Result<()> {
    let payload = read_json(input)?;
    let records: Vec<_> = events_from(&payload)
        .iter()
        .map(|event| normalize(event, kind))
        .collect();

    tracing::info!("✅ Normalized {} {} record(s)", records.len(), kind);
    match records.as_slice() {
        [single] => write_json(output, single),
        _ => write_json(output, &records),
    }
}

async fn run_feed(
    input: Option<&Path>,
    config_path: Option<&Path>,
    endpoint: Option<&str>,
    tracked: Option<std::collections::HashSet<u64>>,
    kind: DeclarationType,
    output: Option<&Path>,
) -> Result<()> {
    let feed = match config_path {
        Some(path) => FeedConfig::from_file(path)?,
        None => FeedConfig::from_env()?,
    };
    feed.validate()?;

    // 命令列的 --tracked 優先於設定
    let tracked = tracked.or_else(|| feed.tracked());
    let events = match input {
        Some(path) => extract_port_calls(&read_json(path)?, tracked.as_ref()),
        None => {
            let endpoint = endpoint.unwrap_or(feed.endpoint());
            tracing::info!("🌊 Fetching port calls from {}", endpoint);
            PortCallFeed::new(endpoint, FEED_TIMEOUT)?
                .fetch_port_calls(tracked.as_ref())
                .await?
        }
    };

    let records: Vec<_> = events
        .iter()
        .map(|event| normalize(event, kind))
        .collect();

    tracing::info!("✅ Normalized {} {} record(s) from the feed", records.len(), kind);
    write_json(output, &records)
}

async fn run_manifest(
    config_path: Option<&Path>,
    request: portcall_etl::domain::model::ManifestRequest,
    timeout_seconds: Option<u64>,
    output: Option<&Path>,
) -> Result<()> {
    let service = match config_path {
        Some(path) => ServiceConfig::from_file(path)?,
        None => ServiceConfig::from_env()?,
    };
    service.validate()?;

    let collaborators = HttpCollaborators::new(&service.collaborators, service.collaborator_timeout())?;
    let backend = HttpCompletionClient::new(&service.generation, service.generation_timeout())?;
    let orchestrator = EnrichmentOrchestrator::new(collaborators, backend, service.retry_policy())
        .with_logging(PromptLogging {
            log_prompts: service.logging.log_prompts.unwrap_or(false),
            log_responses: service.logging.log_responses.unwrap_or(false),
        });

    // Ctrl-C 與逾時都會取消整個流程
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 Interrupted, cancelling");
            signal_token.cancel();
        }
    });
    if let Some(seconds) = timeout_seconds {
        let deadline_token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            tracing::warn!("⏰ Deadline of {}s reached, cancelling", seconds);
            deadline_token.cancel();
        });
    }

    tracing::info!(
        "🚢 Generating cargo manifest for IMO {} arriving at {}",
        request.imo,
        request.port_to_visit
    );
    let manifest = orchestrator.generate_manifest(&request, &cancel).await?;
    if manifest.is_degraded() {
        tracing::warn!("⚠️ Manifest returned as raw text");
    } else {
        tracing::info!("✅ Cargo manifest generated");
    }
    write_json(output, &manifest)
}
