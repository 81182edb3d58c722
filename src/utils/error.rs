use std::time::Duration;
use thiserror::Error;

/// Failure reported by the generation capability for a single attempt.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("generation capability is rate limited (HTTP 429)")]
    RateLimited { retry_after: Option<Duration> },

    #[error("generation capability returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("generation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected generation response: {0}")]
    InvalidResponse(String),
}

impl GenerationError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GenerationError::RateLimited { .. })
    }
}

#[derive(Error, Debug)]
pub enum PortcallError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration field '{field}' is invalid: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Generation still rate limited after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: GenerationError,
    },

    #[error("Generation failed on attempt {attempts}: {source}")]
    GenerationFailed {
        attempts: u32,
        #[source]
        source: GenerationError,
    },

    #[error("Operation cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PortcallError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PortcallError::Cancelled => ErrorSeverity::Low,
            PortcallError::RetriesExhausted { .. } | PortcallError::ApiError(_) => {
                ErrorSeverity::Medium
            }
            PortcallError::GenerationFailed { .. }
            | PortcallError::ProcessingError { .. }
            | PortcallError::ValidationError { .. }
            | PortcallError::SerializationError(_) => ErrorSeverity::High,
            PortcallError::ConfigError { .. }
            | PortcallError::ConfigValidationError { .. }
            | PortcallError::InvalidConfigValueError { .. }
            | PortcallError::MissingConfigError { .. }
            | PortcallError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// True when the caller should back off and try again later.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, PortcallError::RetriesExhausted { .. })
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            PortcallError::RetriesExhausted { .. } => {
                "The generation service is rate limiting requests; wait a minute and retry"
            }
            PortcallError::GenerationFailed { .. } => {
                "Check the generation endpoint, deployment name and API key"
            }
            PortcallError::ApiError(_) => "Check network connectivity and the endpoint URL",
            PortcallError::Cancelled => "Increase --timeout-seconds if the deadline was too short",
            PortcallError::ConfigError { .. }
            | PortcallError::ConfigValidationError { .. }
            | PortcallError::InvalidConfigValueError { .. }
            | PortcallError::MissingConfigError { .. } => {
                "Fix the configuration file or the environment variables it references"
            }
            PortcallError::IoError(_) => "Check that the file exists and is readable",
            PortcallError::SerializationError(_) => "Check that the input is valid JSON",
            PortcallError::ProcessingError { .. } | PortcallError::ValidationError { .. } => {
                "Inspect the input record; run with --verbose for details"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            PortcallError::RetriesExhausted { attempts, .. } => format!(
                "Cargo manifest generation was rate limited ({} attempts made)",
                attempts
            ),
            PortcallError::GenerationFailed { source, .. } => {
                format!("Cargo manifest generation failed: {}", source)
            }
            PortcallError::Cancelled => "The operation was cancelled before it finished".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PortcallError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_distinguished_from_other_failures() {
        let exhausted = PortcallError::RetriesExhausted {
            attempts: 3,
            last_error: GenerationError::RateLimited { retry_after: None },
        };
        let failed = PortcallError::GenerationFailed {
            attempts: 1,
            source: GenerationError::Api {
                status: 401,
                message: "unauthorized".to_string(),
            },
        };

        assert!(exhausted.is_rate_limited());
        assert!(!failed.is_rate_limited());
        assert_eq!(exhausted.severity(), ErrorSeverity::Medium);
        assert_eq!(failed.severity(), ErrorSeverity::High);
        assert!(exhausted.to_string().contains("3 attempts"));
    }

    #[test]
    fn test_config_errors_are_critical() {
        let err = PortcallError::MissingConfigError {
            field: "generation.endpoint".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(
            err.user_friendly_message(),
            "Missing required configuration: generation.endpoint"
        );
    }
}
