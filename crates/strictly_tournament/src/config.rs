//! Layered client configuration: defaults, TOML file, environment, flags.

use crate::llm_client::{LlmConfig, LlmProvider};
use crate::scheduler::PollSettings;
use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Environment variable overriding the server URL.
pub const ENV_SERVER_URL: &str = "TOURNAMENT_SERVER_URL";
/// Environment variable overriding the poll interval in milliseconds.
pub const ENV_POLL_INTERVAL_MS: &str = "TOURNAMENT_POLL_INTERVAL_MS";
/// Environment variable overriding the request timeout in milliseconds.
pub const ENV_REQUEST_TIMEOUT_MS: &str = "TOURNAMENT_REQUEST_TIMEOUT_MS";
/// Environment variable overriding the consecutive failure cap.
pub const ENV_MAX_FAILURES: &str = "TOURNAMENT_MAX_FAILURES";

/// Settings for the tournament client.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the tournament server.
    #[serde(default = "default_server_url")]
    server_url: String,

    /// Milliseconds between status polls.
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,

    /// Milliseconds before a request is abandoned.
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,

    /// Consecutive failed polls before the run gives up.
    #[serde(default = "default_max_consecutive_failures")]
    max_consecutive_failures: u32,

    /// Optional LLM answer provider settings.
    #[serde(default)]
    llm: Option<LlmSettings>,
}

/// The `[llm]` table.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct LlmSettings {
    /// LLM provider (openai or anthropic).
    #[serde(default = "default_provider")]
    provider: LlmProvider,

    /// Model name (e.g., "gpt-4o-mini").
    #[serde(default = "default_model")]
    model: String,

    /// Maximum tokens for an answer.
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
}

fn default_server_url() -> String {
    "http://localhost:5289".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_max_consecutive_failures() -> u32 {
    5
}

fn default_provider() -> LlmProvider {
    LlmProvider::OpenAI
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    50
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
            llm: None,
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from a TOML file. Missing keys take defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(server_url = %config.server_url, "Config loaded successfully");
        Ok(config)
    }

    /// Defaults, overlaid by `path` if given, overlaid by the process
    /// environment.
    #[instrument]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Applies `TOURNAMENT_*` overrides read through `lookup`.
    pub fn apply_env_with<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SERVER_URL) {
            debug!(%url, "Server URL from environment");
            self.server_url = url;
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = parse_env(ENV_POLL_INTERVAL_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            self.request_timeout_ms = parse_env(ENV_REQUEST_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_FAILURES) {
            self.max_consecutive_failures = parse_env(ENV_MAX_FAILURES, &raw)?;
        }
        self.validate()
    }

    /// Rejects a zero poll interval or request timeout.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::new(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::new(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }

    /// Overrides the server URL.
    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = server_url.into();
        self
    }

    /// Overrides the poll interval.
    pub fn with_poll_interval_ms(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Poll loop settings derived from this config.
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings::new(Duration::from_millis(self.poll_interval_ms))
            .with_request_timeout(self.request_timeout())
            .with_max_consecutive_failures(self.max_consecutive_failures)
    }

    /// Creates LLM configuration from the `[llm]` table, or its defaults.
    /// Requires OPENAI_API_KEY or ANTHROPIC_API_KEY environment variable.
    #[instrument(skip(self))]
    pub fn create_llm_config(&self) -> Result<LlmConfig, ConfigError> {
        let settings = self.llm.clone().unwrap_or_default();
        debug!(provider = ?settings.provider, model = %settings.model, "Creating LLM config");

        let var = settings.provider.api_key_var();
        let api_key = std::env::var(var)
            .map_err(|_| ConfigError::new(format!("{} environment variable not set", var)))?;

        Ok(LlmConfig::new(
            settings.provider,
            api_key,
            settings.model,
            settings.max_tokens,
        ))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ConfigError::new(format!("Invalid {}={:?}: {}", key, raw, e)))
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
