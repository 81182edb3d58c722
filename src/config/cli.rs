use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::model::{DeclarationType, ManifestRequest};
use crate::utils::error::Result;
use crate::utils::validation::{validate_non_empty_string, Validate};

#[derive(Debug, Clone, Parser)]
#[command(name = "portcall-etl")]
#[command(about = "Normalizes port-call declarations and generates cargo manifests")]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Normalize one raw port-call event (or a list of them) from a JSON file.
    Normalize {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "ATA")]
        kind: DeclarationType,
        #[arg(long, help = "Write records here instead of stdout")]
        output: Option<PathBuf>,
    },
    /// Read the port-call feed (live or from a file) and normalize every entry.
    Feed {
        #[arg(long, help = "Feed payload saved to disk; fetched live when omitted")]
        input: Option<PathBuf>,
        #[arg(long, help = "TOML file with a [feed] table; PORT_CALL_FEED_URL and TRACKED_VESSELS are used when omitted")]
        config: Option<PathBuf>,
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long, value_delimiter = ',', help = "Only keep these IMO numbers")]
        tracked: Vec<u64>,
        #[arg(long, default_value = "ATA")]
        kind: DeclarationType,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Generate a cargo manifest for one vessel call.
    Manifest {
        #[arg(long, help = "TOML configuration; environment variables are used when omitted")]
        config: Option<PathBuf>,
        #[arg(long)]
        imo: String,
        #[arg(long)]
        port: String,
        #[arg(long)]
        prev_port: Option<String>,
        #[arg(long)]
        berth: Option<String>,
        #[arg(long, help = "Abort the whole run after this many seconds")]
        timeout_seconds: Option<u64>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

impl Command {
    pub fn manifest_request(&self) -> Option<ManifestRequest> {
        match self {
            Command::Manifest {
                imo,
                port,
                prev_port,
                berth,
                ..
            } => Some(ManifestRequest {
                imo: imo.trim().to_string(),
                port_to_visit: port.trim().to_uppercase(),
                prev_port: prev_port.clone(),
                berth_code: berth.clone(),
            }),
            _ => None,
        }
    }

    pub fn tracked_vessels(&self) -> Option<HashSet<u64>> {
        match self {
            Command::Feed { tracked, .. } if !tracked.is_empty() => {
                Some(tracked.iter().copied().collect())
            }
            _ => None,
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if let Command::Manifest { imo, port, timeout_seconds, .. } = &self.command {
            validate_non_empty_string("imo", imo)?;
            validate_non_empty_string("port", port)?;
            if let Some(timeout) = timeout_seconds {
                crate::utils::validation::validate_positive_number(
                    "timeout_seconds",
                    *timeout as usize,
                    1,
                )?;
            }
        }
        if let Command::Feed {
            endpoint: Some(endpoint),
            ..
        } = &self.command
        {
            crate::utils::validation::validate_url("endpoint", endpoint)?;
        }
        Ok(())
    }
}

pub fn read_json(path: &Path) -> Result<Value> {
    let data = fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

/// Pretty-prints `value` to `path`, or to stdout when no path is given.
pub fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, rendered)?;
            tracing::info!("📁 Output saved to: {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
