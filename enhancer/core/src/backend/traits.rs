//! LLM Backend Traits
//!
//! Trait definitions for LLM backends. The producer talks to a model only
//! through [`LlmBackend`], so the enhancement pipeline does not care whether
//! fragments come from an OpenAI-compatible API, a local Ollama server, or a
//! scripted test double.
//!
//! # Stream contract
//!
//! [`LlmBackend::send_streaming`] returns a channel receiver. Implementations
//! send zero or more [`StreamingToken::Token`] values followed by exactly one
//! [`StreamingToken::Complete`] or [`StreamingToken::Error`]. A receiver that
//! closes without a terminal token is treated as a failure by consumers.

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Token stream events from LLM backends
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamingToken {
    /// A fragment of the response
    Token(String),
    /// Response completed successfully
    Complete {
        /// The complete message (concatenation of all tokens)
        message: String,
    },
    /// Error occurred during streaming
    Error(String),
}

impl StreamingToken {
    /// Whether this token ends the stream
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error(_))
    }
}

/// A single streaming generation request
#[derive(Clone, Debug)]
pub struct LlmRequest {
    /// User-level prompt
    pub prompt: String,
    /// Model to use (backend-specific identifier)
    pub model: String,
    /// System-level instructions
    pub system: Option<String>,
    /// Maximum tokens in response (0 = backend default)
    pub max_tokens: u32,
    /// Temperature (0.0-2.0, higher = more creative)
    pub temperature: f32,
}

impl Default for LlmRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            model: String::new(),
            system: None,
            max_tokens: 0,
            temperature: 0.7,
        }
    }
}

impl LlmRequest {
    /// Create a new request with prompt and model
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    /// Set system prompt
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// LLM Backend trait
///
/// Implement this trait to add support for a different model provider.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Get the backend name (e.g., "OpenAI", "Ollama")
    fn name(&self) -> &str;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Send a request and get a streaming response
    ///
    /// Errors returned here happen before any token was produced (connection
    /// refused, HTTP error status). Errors after the stream started arrive as
    /// [`StreamingToken::Error`].
    async fn send_streaming(
        &self,
        request: &LlmRequest,
    ) -> anyhow::Result<mpsc::Receiver<StreamingToken>>;
}

#[async_trait]
impl LlmBackend for Box<dyn LlmBackend> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn health_check(&self) -> bool {
        (**self).health_check().await
    }

    async fn send_streaming(
        &self,
        request: &LlmRequest,
    ) -> anyhow::Result<mpsc::Receiver<StreamingToken>> {
        (**self).send_streaming(request).await
    }
}

/// Backend connection configuration
#[derive(Clone, Debug, PartialEq)]
pub enum BackendConfig {
    /// OpenAI-compatible chat completions API
    OpenAi {
        /// API key for bearer authentication
        api_key: Option<String>,
        /// Base URL including the version prefix
        base_url: String,
    },
    /// Direct Ollama connection
    Ollama {
        /// Ollama host address
        host: String,
        /// Ollama port number
        port: u16,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::OpenAi {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

impl BackendConfig {
    /// Create Ollama configuration
    pub fn ollama(host: impl Into<String>, port: u16) -> Self {
        Self::Ollama {
            host: host.into(),
            port,
        }
    }

    /// Create OpenAI-compatible configuration
    pub fn openai(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self::OpenAi {
            api_key,
            base_url: base_url.into(),
        }
    }

    /// Short name of the backend kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OpenAi { .. } => "openai",
            Self::Ollama { .. } => "ollama",
        }
    }

    /// Construct the backend described by this configuration
    #[must_use]
    pub fn build(&self) -> Box<dyn LlmBackend> {
        match self {
            Self::OpenAi { api_key, base_url } => {
                Box::new(super::OpenAiBackend::new(base_url.clone(), api_key.clone()))
            }
            Self::Ollama { host, port } => Box::new(super::OllamaBackend::new(host.clone(), *port)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_request_builder() {
        let request = LlmRequest::new("Hello", "gpt-4o-mini")
            .with_temperature(0.5)
            .with_system("You are helpful")
            .with_max_tokens(100);

        assert_eq!(request.prompt, "Hello");
        assert_eq!(request.model, "gpt-4o-mini");
        assert!((request.temperature - 0.5).abs() < f32::EPSILON);
        assert_eq!(request.system, Some("You are helpful".to_string()));
        assert_eq!(request.max_tokens, 100);
    }

    #[test]
    fn test_temperature_is_clamped() {
        let request = LlmRequest::new("Hi", "m").with_temperature(9.0);
        assert!((request.temperature - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_terminal_tokens() {
        assert!(!StreamingToken::Token("a".into()).is_terminal());
        assert!(StreamingToken::Complete {
            message: String::new()
        }
        .is_terminal());
        assert!(StreamingToken::Error("boom".into()).is_terminal());
    }

    #[test]
    fn test_backend_config_default() {
        let config = BackendConfig::default();
        match config {
            BackendConfig::OpenAi { api_key, base_url } => {
                assert!(api_key.is_none());
                assert_eq!(base_url, "https://api.openai.com/v1");
            }
            BackendConfig::Ollama { .. } => panic!("Expected OpenAI config"),
        }
    }

    #[test]
    fn test_build_selects_backend() {
        assert_eq!(BackendConfig::ollama("localhost", 11434).build().name(), "Ollama");
        assert_eq!(BackendConfig::default().build().name(), "OpenAI");
        assert_eq!(BackendConfig::ollama("h", 1).kind(), "ollama");
    }
}
