use crate::core::retry::RetryPolicy;
use crate::utils::error::{PortcallError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, validate_resolved,
    validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_FEED_ENDPOINT: &str = "https://meri.digitraffic.fi/api/port-call/v1/port-calls";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub collaborators: CollaboratorsConfig,
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorsConfig {
    pub base_url: String,
    pub timeout_seconds: Option<u64>,
    #[serde(default = "default_vessel_endpoint")]
    pub vessel: EndpointConfig,
    #[serde(default = "default_port_endpoint")]
    pub port: EndpointConfig,
    #[serde(default = "default_history_endpoint")]
    pub history: EndpointConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointConfig {
    pub path: String,
    pub headers: Option<HashMap<String, String>>,
}

impl EndpointConfig {
    fn at(path: &str) -> Self {
        Self {
            path: path.to_string(),
            headers: None,
        }
    }
}

fn default_vessel_endpoint() -> EndpointConfig {
    EndpointConfig::at("/api/vessel-details")
}

fn default_port_endpoint() -> EndpointConfig {
    EndpointConfig::at("/api/port-details")
}

fn default_history_endpoint() -> EndpointConfig {
    EndpointConfig::at("/api/historical-cargo")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub endpoint: String,
    pub headers: Option<HashMap<String, String>>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub base_delay_seconds: Option<f64>,
    pub jitter: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub log_prompts: Option<bool>,
    pub log_responses: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedConfig {
    pub endpoint: Option<String>,
    pub tracked_vessels: Option<Vec<u64>>,
}

#[derive(Deserialize)]
struct FeedFile {
    #[serde(default)]
    feed: FeedConfig,
}

impl FeedConfig {
    /// Reads `PORT_CALL_FEED_URL` and the comma-separated `TRACKED_VESSELS`.
    pub fn from_env() -> Result<Self> {
        let tracked_vessels = match std::env::var("TRACKED_VESSELS") {
            Ok(raw) => Some(parse_tracked_vessels(&raw)?),
            Err(_) => None,
        };
        Ok(Self {
            endpoint: std::env::var("PORT_CALL_FEED_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            tracked_vessels,
        })
    }

    /// Loads the `[feed]` table only; the other sections may be absent.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(PortcallError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = ServiceConfig::substitute_env_vars(content)?;
        let file: FeedFile =
            toml::from_str(&processed_content).map_err(|e| PortcallError::ConfigValidationError {
                field: "toml_parsing".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;
        Ok(file.feed)
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_FEED_ENDPOINT)
    }

    /// `None` when no vessels are listed, meaning every vessel is kept.
    pub fn tracked(&self) -> Option<HashSet<u64>> {
        self.tracked_vessels
            .as_ref()
            .filter(|imos| !imos.is_empty())
            .map(|imos| imos.iter().copied().collect())
    }
}

impl Validate for FeedConfig {
    fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.endpoint {
            validate_url("feed.endpoint", endpoint)?;
        }
        Ok(())
    }
}

/// Parses a comma-separated IMO list such as `9606900, 9300000`.
pub fn parse_tracked_vessels(raw: &str) -> Result<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>()
                .map_err(|_| PortcallError::InvalidConfigValueError {
                    field: "TRACKED_VESSELS".to_string(),
                    value: raw.to_string(),
                    reason: format!("'{}' is not an IMO number", part),
                })
        })
        .collect()
}

impl ServiceConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(PortcallError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| PortcallError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GENERATION_API_KEY})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| PortcallError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Builds the configuration from process environment variables alone.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("FUNCTION_APP_URL").map_err(|_| {
            PortcallError::MissingConfigError {
                field: "FUNCTION_APP_URL".to_string(),
            }
        })?;
        let endpoint = std::env::var("GENERATION_ENDPOINT").map_err(|_| {
            PortcallError::MissingConfigError {
                field: "GENERATION_ENDPOINT".to_string(),
            }
        })?;

        let keyed = |mut endpoint: EndpointConfig, var: &str| {
            endpoint.headers = function_key_headers(var);
            endpoint
        };

        let generation_headers = std::env::var("GENERATION_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .map(|key| HashMap::from([("Authorization".to_string(), format!("Bearer {}", key))]));

        Ok(Self {
            collaborators: CollaboratorsConfig {
                base_url,
                timeout_seconds: env_parse("COLLABORATOR_TIMEOUT_SECONDS")?,
                vessel: keyed(default_vessel_endpoint(), "VESSEL_DETAILS_FUNCTION_KEY"),
                port: keyed(default_port_endpoint(), "PORT_DETAILS_FUNCTION_KEY"),
                history: keyed(default_history_endpoint(), "HISTORICAL_CARGO_FUNCTION_KEY"),
            },
            generation: GenerationConfig {
                endpoint,
                headers: generation_headers,
                model: std::env::var("GENERATION_MODEL").ok(),
                temperature: env_parse("GENERATION_TEMPERATURE")?,
                max_tokens: env_parse("GENERATION_MAX_TOKENS")?,
                timeout_seconds: env_parse("GENERATION_TIMEOUT_SECONDS")?,
            },
            retry: RetryConfig {
                max_attempts: env_parse("RETRY_MAX_ATTEMPTS")?,
                base_delay_seconds: env_parse("RETRY_BASE_DELAY_SECONDS")?,
                jitter: env_parse("RETRY_JITTER")?,
            },
            logging: LoggingConfig {
                log_prompts: env_parse("LOG_PROMPTS")?,
                log_responses: env_parse("LOG_RESPONSES")?,
            },
            feed: FeedConfig::from_env()?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self.retry.max_attempts.unwrap_or(defaults.max_attempts),
            base_delay: self
                .retry
                .base_delay_seconds
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64)
                .unwrap_or(defaults.base_delay),
            jitter: self.retry.jitter.unwrap_or(defaults.jitter),
        }
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborators.timeout_seconds.unwrap_or(30))
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation.timeout_seconds.unwrap_or(120))
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_url("collaborators.base_url", &self.collaborators.base_url)?;
        for (name, endpoint) in [
            ("collaborators.vessel", &self.collaborators.vessel),
            ("collaborators.port", &self.collaborators.port),
            ("collaborators.history", &self.collaborators.history),
        ] {
            validate_non_empty_string(&format!("{}.path", name), &endpoint.path)?;
            validate_headers(&format!("{}.headers", name), endpoint.headers.as_ref())?;
        }

        validate_url("generation.endpoint", &self.generation.endpoint)?;
        validate_headers("generation.headers", self.generation.headers.as_ref())?;
        if let Some(temperature) = self.generation.temperature {
            validate_range("generation.temperature", temperature, 0.0, 2.0)?;
        }

        if let Some(max_attempts) = self.retry.max_attempts {
            validate_positive_number("retry.max_attempts", max_attempts as usize, 1)?;
        }
        if let Some(base_delay) = self.retry.base_delay_seconds {
            validate_range("retry.base_delay_seconds", base_delay, 0.0, 300.0)?;
        }
        if let Some(jitter) = self.retry.jitter {
            validate_range("retry.jitter", jitter, 0.0, 1.0)?;
        }

        self.feed.validate()
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

fn validate_headers(field: &str, headers: Option<&HashMap<String, String>>) -> Result<()> {
    for (name, value) in headers.into_iter().flatten() {
        validate_non_empty_string(field, name)?;
        validate_resolved(&format!("{}.{}", field, name), value)?;
    }
    Ok(())
}

fn function_key_headers(var: &str) -> Option<HashMap<String, String>> {
    std::env::var(var)
        .ok()
        .filter(|key| !key.is_empty())
        .map(|key| HashMap::from([("x-functions-key".to_string(), key)]))
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Result<Option<T>> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| PortcallError::InvalidConfigValueError {
                field: var.to_string(),
                value: raw.clone(),
                reason: "could not be parsed".to_string(),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[collaborators]
base_url = "https://portman.example.com"
timeout_seconds = 10

[collaborators.port]
path = "/api/port-details"
headers = { "x-functions-key" = "port-key" }

[generation]
endpoint = "https://llm.example.com/v1/generate"
model = "cargo-large"
temperature = 0.7
max_tokens = 2000
"#;

    #[test]
    fn test_parse_basic_toml_config() {
        let config = ServiceConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.collaborators.base_url, "https://portman.example.com");
        assert_eq!(config.collaborators.vessel.path, "/api/vessel-details");
        assert_eq!(
            config.collaborators.port.headers.as_ref().unwrap()["x-functions-key"],
            "port-key"
        );
        assert_eq!(config.collaborator_timeout(), Duration::from_secs(10));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.feed.endpoint(), DEFAULT_FEED_ENDPOINT);
        assert_eq!(config.feed.tracked(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_section_overrides_defaults() {
        let content = format!(
            "{}\n[retry]\nmax_attempts = 5\nbase_delay_seconds = 0.5\njitter = 0.0\n",
            BASIC
        );
        let policy = ServiceConfig::from_toml_str(&content).unwrap().retry_policy();

        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.jitter, 0.0);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("PORTCALL_TEST_GENERATION_KEY", "secret-token");
        let content = BASIC.replace(
            "model = \"cargo-large\"",
            "headers = { Authorization = \"Bearer ${PORTCALL_TEST_GENERATION_KEY}\" }",
        );

        let config = ServiceConfig::from_toml_str(&content).unwrap();
        assert_eq!(
            config.generation.headers.as_ref().unwrap()["Authorization"],
            "Bearer secret-token"
        );

        std::env::remove_var("PORTCALL_TEST_GENERATION_KEY");
    }

    #[test]
    fn test_unresolved_placeholder_fails_validation() {
        let content = BASIC.replace("port-key", "${PORTCALL_TEST_UNSET_KEY}");
        let config = ServiceConfig::from_toml_str(&content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation() {
        let content = BASIC.replace("https://llm.example.com/v1/generate", "invalid-url");
        assert!(ServiceConfig::from_toml_str(&content).unwrap().validate().is_err());

        let content = format!("{}\n[retry]\njitter = 1.5\n", BASIC);
        assert!(ServiceConfig::from_toml_str(&content).unwrap().validate().is_err());

        let content = format!("{}\n[retry]\njitter = nan\n", BASIC);
        let config = ServiceConfig::from_toml_str(&content).unwrap();
        assert!(config.retry.jitter.unwrap().is_nan());
        assert!(config.validate().is_err());
        assert_eq!(config.retry_policy().sample_delay(1), Duration::from_secs(5));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = ServiceConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.generation.model.as_deref(), Some("cargo-large"));
    }

    #[test]
    fn test_feed_section_alone_is_enough() {
        let content = r#"
[feed]
endpoint = "https://feed.example.com/port-calls"
tracked_vessels = [9606900, 9300000]
"#;
        let feed = FeedConfig::from_toml_str(content).unwrap();
        assert_eq!(feed.endpoint(), "https://feed.example.com/port-calls");
        assert_eq!(feed.tracked(), Some(HashSet::from([9606900, 9300000])));
        assert!(feed.validate().is_ok());

        let feed = FeedConfig::from_toml_str(BASIC).unwrap();
        assert_eq!(feed.endpoint(), DEFAULT_FEED_ENDPOINT);

        let feed = FeedConfig::from_toml_str("[feed]\ntracked_vessels = []\n").unwrap();
        assert_eq!(feed.tracked(), None);

        let feed = FeedConfig::from_toml_str("[feed]\nendpoint = \"not a url\"\n").unwrap();
        assert!(feed.validate().is_err());
    }

    #[test]
    fn test_tracked_vessels_list() {
        assert_eq!(parse_tracked_vessels("9606900, 9300000,").unwrap(), vec![9606900, 9300000]);
        assert!(parse_tracked_vessels("").unwrap().is_empty());
        assert!(matches!(
            parse_tracked_vessels("9606900,abc"),
            Err(PortcallError::InvalidConfigValueError { .. })
        ));

        std::env::set_var("TRACKED_VESSELS", "9606900,9300000");
        let feed = FeedConfig::from_env().unwrap();
        std::env::remove_var("TRACKED_VESSELS");
        assert_eq!(feed.tracked(), Some(HashSet::from([9606900, 9300000])));
    }

    #[test]
    fn test_missing_section_is_reported() {
        let err = ServiceConfig::from_toml_str("[generation]\nendpoint = \"https://x.example\"\n")
            .unwrap_err();
        assert!(matches!(err, PortcallError::ConfigValidationError { .. }));
    }
}
