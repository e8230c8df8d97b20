//! TOML Configuration File Support
//!
//! Centralized configuration loading for the enhancer, supporting a TOML
//! configuration file at `~/.config/prompt-enhancer/enhancer.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied through [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! The configuration file follows XDG Base Directory specification:
//! - `$XDG_CONFIG_HOME/prompt-enhancer/enhancer.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! kind = "ollama"
//! host = "localhost"
//! port = 11434
//!
//! [model]
//! name = "llama3.2"
//! temperature = 0.7
//!
//! [stream]
//! request_timeout_secs = 120
//! channel_capacity = 100
//! indicator_linger_ms = 1000
//!
//! [input]
//! max_input_chars = 2000
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `ENHANCER_BACKEND` | `backend.kind` |
//! | `ENHANCER_MODEL` | `model.name` |
//! | `ENHANCER_TIMEOUT_SECS` | `stream.request_timeout_secs` |
//! | `ENHANCER_MAX_INPUT_CHARS` | `input.max_input_chars` |
//! | `OPENAI_API_KEY` | `backend.api_key` |
//! | `OPENAI_BASE_URL` | `backend.base_url` |
//! | `OLLAMA_HOST` | `backend.host` |
//! | `OLLAMA_PORT` | `backend.port` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::BackendConfig;
use crate::channel::DEFAULT_CHANNEL_CAPACITY;
use crate::producer::ProducerConfig;
use crate::session::SessionConfig;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// Backend Selection
// =============================================================================

/// Which provider family to talk to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OpenAI-compatible chat completions
    #[default]
    OpenAi,
    /// Local Ollama server
    Ollama,
}

impl BackendKind {
    /// Model used when none is configured
    #[must_use]
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Ollama => "llama3.2",
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::ValidationError(format!(
                "unknown backend '{other}' (expected 'openai' or 'ollama')"
            ))),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Provider family
    pub kind: Option<BackendKind>,

    /// OpenAI-compatible base URL (including `/v1`)
    pub base_url: Option<String>,

    /// OpenAI-compatible API key
    pub api_key: Option<String>,

    /// Ollama host
    pub host: Option<String>,

    /// Ollama port
    pub port: Option<u16>,
}

/// Model section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelToml {
    /// Model identifier
    pub name: Option<String>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

/// Stream section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamToml {
    /// Backend call timeout in seconds (0 = no timeout)
    pub request_timeout_secs: Option<u64>,

    /// Fragments buffered between producer and consumer
    pub channel_capacity: Option<usize>,

    /// Activity indicator linger in milliseconds
    pub indicator_linger_ms: Option<u64>,
}

/// Input section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputToml {
    /// Maximum idea length in characters
    pub max_input_chars: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancerToml {
    /// Backend configuration section
    pub backend: BackendToml,

    /// Model configuration section
    pub model: ModelToml,

    /// Stream configuration section
    pub stream: StreamToml,

    /// Input configuration section
    pub input: InputToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Effective enhancer configuration
///
/// Consolidates all configuration sources and tracks where the values came
/// from. Use [`load_config`] to load configuration with proper priority.
#[derive(Clone, Debug)]
pub struct EnhancerConfigFile {
    /// Provider family
    pub backend_kind: BackendKind,

    /// OpenAI-compatible base URL
    pub openai_base_url: String,

    /// OpenAI-compatible API key
    pub api_key: Option<String>,

    /// Ollama host
    pub ollama_host: String,

    /// Ollama port
    pub ollama_port: u16,

    /// Model override; `None` uses the backend's default model
    pub model: Option<String>,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens to generate (0 = backend default)
    pub max_tokens: u32,

    /// Backend call timeout (`None` = no timeout)
    pub request_timeout: Option<Duration>,

    /// Fragments buffered between producer and consumer
    pub channel_capacity: usize,

    /// Activity indicator linger after a cycle ends
    pub indicator_linger: Duration,

    /// Maximum idea length in characters
    pub max_input_chars: usize,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for EnhancerConfigFile {
    fn default() -> Self {
        Self {
            backend_kind: BackendKind::OpenAi,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            ollama_host: "localhost".to_string(),
            ollama_port: 11434,
            model: None,
            temperature: 0.7,
            max_tokens: 0,
            request_timeout: Some(Duration::from_secs(120)),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            indicator_linger: Duration::from_millis(1000),
            max_input_chars: 2000,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl EnhancerConfigFile {
    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Model that will actually be requested
    #[must_use]
    pub fn effective_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.backend_kind.default_model())
    }

    /// Backend connection settings
    #[must_use]
    pub fn backend_config(&self) -> BackendConfig {
        match self.backend_kind {
            BackendKind::OpenAi => {
                BackendConfig::openai(self.openai_base_url.clone(), self.api_key.clone())
            }
            BackendKind::Ollama => BackendConfig::ollama(self.ollama_host.clone(), self.ollama_port),
        }
    }

    /// Producer settings
    #[must_use]
    pub fn producer_config(&self) -> ProducerConfig {
        ProducerConfig {
            model: self.effective_model().to_string(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            request_timeout: self.request_timeout,
            channel_capacity: self.channel_capacity,
        }
    }

    /// Session settings
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            indicator_linger: self.indicator_linger,
        }
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "model.temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "stream.channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_input_chars == 0 {
            return Err(ConfigError::ValidationError(
                "input.max_input_chars must be at least 1".to_string(),
            ));
        }
        if self.ollama_port == 0 {
            return Err(ConfigError::ValidationError(
                "backend.port must not be 0".to_string(),
            ));
        }
        if self.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "model.name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Seconds to an optional timeout, where zero disables it
fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/prompt-enhancer/enhancer.toml` or
/// `~/.config/prompt-enhancer/enhancer.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("prompt-enhancer").join("enhancer.toml"))
}

/// Load configuration from all sources with proper priority
///
/// Priority order (highest first):
/// 1. CLI arguments (not handled here - caller should apply after)
/// 2. Environment variables
/// 3. TOML configuration file
/// 4. Default values
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if a
/// value is out of range. A missing config file is not an error.
pub fn load_config() -> Result<EnhancerConfigFile, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<EnhancerConfigFile, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration reading environment variables through `env`
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_config_with_env(
    path: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<EnhancerConfigFile, ConfigError> {
    // Start with defaults
    let mut config = EnhancerConfigFile::default();

    // Try to load from file
    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: EnhancerToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    // Apply environment variables (overrides file values)
    apply_env_config(&mut config, env);

    config.validate()?;
    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut EnhancerConfigFile, toml: &EnhancerToml) {
    // Backend settings
    if let Some(kind) = toml.backend.kind {
        config.backend_kind = kind;
    }
    if let Some(ref url) = toml.backend.base_url {
        config.openai_base_url.clone_from(url);
    }
    if toml.backend.api_key.is_some() {
        config.api_key.clone_from(&toml.backend.api_key);
    }
    if let Some(ref host) = toml.backend.host {
        config.ollama_host.clone_from(host);
    }
    if let Some(port) = toml.backend.port {
        config.ollama_port = port;
    }

    // Model settings
    if toml.model.name.is_some() {
        config.model.clone_from(&toml.model.name);
    }
    if let Some(temperature) = toml.model.temperature {
        config.temperature = temperature;
    }
    if let Some(max_tokens) = toml.model.max_tokens {
        config.max_tokens = max_tokens;
    }

    // Stream settings
    if let Some(secs) = toml.stream.request_timeout_secs {
        config.request_timeout = timeout_from_secs(secs);
    }
    if let Some(capacity) = toml.stream.channel_capacity {
        config.channel_capacity = capacity;
    }
    if let Some(ms) = toml.stream.indicator_linger_ms {
        config.indicator_linger = Duration::from_millis(ms);
    }

    // Input settings
    if let Some(max) = toml.input.max_input_chars {
        config.max_input_chars = max;
    }
}

/// Apply environment variable overrides to the config
///
/// Unparseable values are logged and ignored.
fn apply_env_config(config: &mut EnhancerConfigFile, env: impl Fn(&str) -> Option<String>) {
    if let Some(kind) = env("ENHANCER_BACKEND") {
        match kind.parse::<BackendKind>() {
            Ok(kind) => {
                config.backend_kind = kind;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring ENHANCER_BACKEND"),
        }
    }
    if let Some(model) = env("ENHANCER_MODEL").filter(|m| !m.trim().is_empty()) {
        config.model = Some(model);
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = env("ENHANCER_TIMEOUT_SECS") {
        if let Ok(secs) = timeout.parse::<u64>() {
            config.request_timeout = timeout_from_secs(secs);
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %timeout, "Ignoring ENHANCER_TIMEOUT_SECS");
        }
    }
    if let Some(max) = env("ENHANCER_MAX_INPUT_CHARS") {
        if let Ok(n) = max.parse::<usize>() {
            config.max_input_chars = n;
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %max, "Ignoring ENHANCER_MAX_INPUT_CHARS");
        }
    }

    // Provider settings
    if let Some(key) = env("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
        config.api_key = Some(key);
        config.source = ConfigSource::Env;
    }
    if let Some(url) = env("OPENAI_BASE_URL").filter(|u| !u.is_empty()) {
        config.openai_base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(host) = env("OLLAMA_HOST").filter(|h| !h.is_empty()) {
        config.ollama_host = host;
        config.source = ConfigSource::Env;
    }
    if let Some(port) = env("OLLAMA_PORT") {
        if let Ok(p) = port.parse::<u16>() {
            config.ollama_port = p;
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %port, "Ignoring OLLAMA_PORT");
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Backend kind override
    pub backend: Option<BackendKind>,

    /// Model override
    pub model: Option<String>,

    /// Request timeout override (seconds, 0 = none)
    pub timeout_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set backend override
    #[must_use]
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set model override
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    /// Set request timeout override
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Whether any override is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backend.is_none() && self.model.is_none() && self.timeout_secs.is_none()
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut EnhancerConfigFile) {
        if !self.is_empty() {
            config.source = ConfigSource::Cli;
        }

        if let Some(backend) = self.backend {
            config.backend_kind = backend;
        }

        if let Some(ref model) = self.model {
            config.model = Some(model.clone());
        }

        if let Some(secs) = self.timeout_secs {
            config.request_timeout = timeout_from_secs(secs);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
