pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{HttpCollaborators, HttpCompletionClient};
pub use config::ServiceConfig;
pub use core::normalizer::{normalize, normalize_at};
pub use core::orchestrator::{EnrichmentOrchestrator, PromptLogging};
pub use core::retry::RetryPolicy;
pub use utils::error::{PortcallError, Result};
