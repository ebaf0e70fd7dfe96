//! Configuration for wiring a pediflow process.
//!
//! Every section has serde defaults, so a partial JSON document (or none at
//! all) yields a usable configuration. Environment variables override file
//! values through [`PediflowConfig::apply_env`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::PediflowError;

/// API key value shipped in sample configs; treated as unset.
pub const PLACEHOLDER_API_KEY: &str = "your-openai-api-key-here";

/// Completion endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Completion token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl GatewayConfig {
    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// The API key, unless it is empty or the placeholder.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty() && *k != PLACEHOLDER_API_KEY)
    }

    /// Returns true if a usable API key is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }
}

/// Shared rate limiter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Minimum gap between successive gateway calls.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

fn default_min_interval_ms() -> u64 {
    1000
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

impl RateLimitConfig {
    /// The interval as a duration.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// Shared circuit breaker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the breaker.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// How long an open breaker rejects calls.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_ms() -> u64 {
    60_000
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl CircuitBreakerConfig {
    /// The cooldown as a duration.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Tracing subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `"info"` or `"pediflow=debug"`. `RUST_LOG`
    /// applies when unset.
    #[serde(default)]
    pub level: Option<String>,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    /// Sets the filter directive.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Enables JSON output.
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PediflowConfig {
    /// Completion endpoint.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Rate limiter.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Circuit breaker.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PediflowConfig {
    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`PediflowError::Config`] if the JSON is malformed.
    pub fn from_json_str(json: &str) -> Result<Self, PediflowError> {
        serde_json::from_str(json).map_err(|e| PediflowError::Config(e.to_string()))
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`PediflowError::Io`] if the file cannot be read, or
    /// [`PediflowError::Config`] if it is malformed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PediflowError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Defaults overridden by the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`PediflowError::Config`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, PediflowError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Applies overrides from the process environment.
    ///
    /// # Errors
    ///
    /// See [`PediflowConfig::from_env`].
    pub fn apply_env(&mut self) -> Result<(), PediflowError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides using `lookup` as the environment.
    ///
    /// Recognised variables: `PEDIFLOW_API_KEY` (falling back to
    /// `OPENAI_API_KEY`), `PEDIFLOW_BASE_URL`, `PEDIFLOW_MODEL`,
    /// `PEDIFLOW_MIN_INTERVAL_MS`, `PEDIFLOW_LOG_LEVEL`, `PEDIFLOW_LOG_JSON`.
    ///
    /// # Errors
    ///
    /// See [`PediflowConfig::from_env`].
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), PediflowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("PEDIFLOW_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.gateway.api_key = Some(key);
        }
        if let Some(url) = lookup("PEDIFLOW_BASE_URL") {
            self.gateway.base_url = url;
        }
        if let Some(model) = lookup("PEDIFLOW_MODEL") {
            self.gateway.model = model;
        }
        if let Some(ms) = lookup("PEDIFLOW_MIN_INTERVAL_MS") {
            self.rate_limit.min_interval_ms = ms.trim().parse().map_err(|_| {
                PediflowError::Config(format!("PEDIFLOW_MIN_INTERVAL_MS is not a number: '{ms}'"))
            })?;
        }
        if let Some(level) = lookup("PEDIFLOW_LOG_LEVEL") {
            self.logging.level = Some(level);
        }
        if let Some(json) = lookup("PEDIFLOW_LOG_JSON") {
            self.logging.json = matches!(json.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PediflowConfig::default();
        assert_eq!(config.rate_limit.min_interval_ms, 1000);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.cooldown(), Duration::from_secs(60));
        assert!(!config.gateway.is_configured());
    }

    #[test]
    fn test_partial_json() {
        let config =
            PediflowConfig::from_json_str(r#"{"gateway": {"model": "gpt-4o-mini"}}"#).unwrap();
        assert_eq!(config.gateway.model, "gpt-4o-mini");
        assert_eq!(config.gateway.max_tokens, 1000);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            PediflowConfig::from_json_str("{"),
            Err(PediflowError::Config(_))
        ));
    }

    #[test]
    fn test_placeholder_key_is_unset() {
        let gateway = GatewayConfig::default().with_api_key(PLACEHOLDER_API_KEY);
        assert!(!gateway.is_configured());
        assert!(GatewayConfig::default().with_api_key("sk-1").is_configured());
        assert!(!GatewayConfig::default().with_api_key("  ").is_configured());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-fallback"),
            ("PEDIFLOW_MODEL", "local-model"),
            ("PEDIFLOW_MIN_INTERVAL_MS", "250"),
            ("PEDIFLOW_LOG_JSON", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = PediflowConfig::default();
        config
            .apply_env_from(|k| env.get(k).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.gateway.api_key(), Some("sk-fallback"));
        assert_eq!(config.gateway.model, "local-model");
        assert_eq!(config.rate_limit.min_interval(), Duration::from_millis(250));
        assert!(config.logging.json);
    }

    #[test]
    fn test_env_bad_number() {
        let mut config = PediflowConfig::default();
        let result = config.apply_env_from(|k| {
            (k == "PEDIFLOW_MIN_INTERVAL_MS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(PediflowError::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"rate_limit": {{"min_interval_ms": 10}}, "logging": {{"level": "debug"}}}}"#).unwrap();

        let config = PediflowConfig::from_file(file.path()).unwrap();
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert_eq!(config.rate_limit.min_interval_ms, 10);
    }
}
