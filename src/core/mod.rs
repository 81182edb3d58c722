pub mod feed;
pub mod fields;
pub mod manifest;
pub mod normalizer;
pub mod orchestrator;
pub mod prompt;
pub mod retry;

pub use crate::domain::model::{DeclarationRecord, DeclarationType, RawPortCallEvent};
pub use crate::domain::ports::{CompletionBackend, EnrichmentSource, Sleeper};
pub use crate::utils::error::Result;
pub use orchestrator::EnrichmentOrchestrator;
