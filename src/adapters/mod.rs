// Adapters layer: HTTP implementations of the domain ports.

pub mod collaborators;
pub mod completion;

pub use collaborators::{fallback_port_metadata, HttpCollaborators};
pub use completion::HttpCompletionClient;
