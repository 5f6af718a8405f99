pub mod validation;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use self::validation::validate_config;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_http_pool_max_idle_per_host")]
    pub http_pool_max_idle_per_host: usize,
    #[serde(default = "default_http_pool_idle_timeout_secs")]
    pub http_pool_idle_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub runtime_worker_threads: Option<usize>,
    #[serde(default)]
    pub base_path: String,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_timeout() -> u64 {
    180
}
fn default_http_pool_max_idle_per_host() -> usize {
    16
}
fn default_http_pool_idle_timeout_secs() -> u64 {
    15
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            timeout: default_timeout(),
            http_pool_max_idle_per_host: default_http_pool_max_idle_per_host(),
            http_pool_idle_timeout_secs: default_http_pool_idle_timeout_secs(),
            runtime_worker_threads: None,
            base_path: String::new(),
        }
    }
}

/// Upstream inference service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Client-facing alias -> upstream model name. Unknown names resolve to
    /// themselves.
    #[serde(default)]
    pub model_aliases: HashMap<String, String>,
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Reasoning translation settings: display allowlist, delimiter tags, and the
/// request override fragments consumed by the merge engine.
///
/// Fragment values are arbitrary YAML trees deserialized into
/// [`serde_json::Value`]; a missing fragment is `Null` and merges as a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Case-insensitive substrings matched against the resolved upstream
    /// model to decide whether reasoning is displayed or stripped.
    #[serde(default)]
    pub display_models: Vec<String>,
    #[serde(default = "default_think_open_tag")]
    pub think_open_tag: String,
    #[serde(default = "default_think_close_tag")]
    pub think_close_tag: String,
    #[serde(default)]
    pub always_hint_thinking: bool,
    #[serde(default)]
    pub request_overrides: Value,
    #[serde(default)]
    pub model_request_overrides: HashMap<String, Value>,
    #[serde(default)]
    pub extra_body: Value,
    #[serde(default)]
    pub model_extra_body: HashMap<String, Value>,
}

fn default_think_open_tag() -> String {
    "<think>".to_string()
}
fn default_think_close_tag() -> String {
    "</think>".to_string()
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            display_models: Vec::new(),
            think_open_tag: default_think_open_tag(),
            think_close_tag: default_think_close_tag(),
            always_hint_thinking: false,
            request_overrides: Value::Null,
            model_request_overrides: HashMap::new(),
            extra_body: Value::Null,
            model_extra_body: HashMap::new(),
        }
    }
}

impl ReasoningConfig {
    /// Whether reasoning is surfaced for the given resolved upstream model.
    #[must_use]
    pub fn display_enabled_for(&self, resolved_model: &str) -> bool {
        let model = resolved_model.to_ascii_lowercase();
        self.display_models
            .iter()
            .any(|pattern| model.contains(&pattern.to_ascii_lowercase()))
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_yaml::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}
