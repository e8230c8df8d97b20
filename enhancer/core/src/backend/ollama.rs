//! Ollama Backend Implementation
//!
//! LLM backend for Ollama (local LLM server).
//!
//! # Ollama API
//!
//! - `/api/generate` - Generate completions as newline-delimited JSON
//! - `/api/tags` - List available models (used as a health probe)
//!
//! Each streamed line carries a `response` fragment and a `done` flag; a line
//! with an `error` field aborts the stream.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::lines::{spawn_line_pump, LineEvent};
use super::traits::{LlmBackend, LlmRequest, StreamingToken};

/// Ollama backend client
#[derive(Clone)]
pub struct OllamaBackend {
    /// Host address
    host: String,
    /// Port number
    port: u16,
    /// HTTP client
    http_client: reqwest::Client,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            http_client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Get the base URL
    fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Get generate endpoint URL
    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url())
    }

    /// Get tags endpoint URL
    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url())
    }

    /// Build the JSON body for a streaming generate call
    fn build_body(request: &LlmRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": true,
        });

        if let Some(ref system) = request.system {
            body["system"] = serde_json::json!(system);
        }

        let mut options = serde_json::Map::new();
        options.insert(
            "temperature".to_string(),
            serde_json::json!(request.temperature),
        );
        if request.max_tokens > 0 {
            options.insert(
                "num_predict".to_string(),
                serde_json::json!(request.max_tokens),
            );
        }
        body["options"] = serde_json::Value::Object(options);

        body
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new("localhost", 11434)
    }
}

/// Interpret one NDJSON line from `/api/generate`
pub(crate) fn parse_generate_line(line: &str) -> LineEvent {
    let line = line.trim();
    if line.is_empty() {
        return LineEvent::Skip;
    }

    let data: serde_json::Value = match serde_json::from_str(line) {
        Ok(data) => data,
        Err(e) => return LineEvent::Error(format!("Malformed Ollama response: {e}")),
    };

    if let Some(error) = data.get("error").and_then(|e| e.as_str()) {
        return LineEvent::Error(format!("Ollama error: {error}"));
    }

    LineEvent::Data {
        fragment: data
            .get("response")
            .and_then(|r| r.as_str())
            .map(String::from),
        done: data
            .get("done")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false),
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    fn name(&self) -> &str {
        "Ollama"
    }

    async fn health_check(&self) -> bool {
        self.http_client
            .get(self.tags_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    async fn send_streaming(
        &self,
        request: &LlmRequest,
    ) -> anyhow::Result<mpsc::Receiver<StreamingToken>> {
        let (tx, rx) = mpsc::channel(100);

        let response = self
            .http_client
            .post(self.generate_url())
            .json(&Self::build_body(request))
            .send()
            .await?;

        // Check for HTTP errors
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned {status}: {body}");
        }

        tracing::debug!(model = %request.model, "Ollama stream opened");
        spawn_line_pump(response.bytes_stream(), parse_generate_line, tx);

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_backend_creation() {
        let backend = OllamaBackend::new("localhost", 11434);
        assert_eq!(backend.host, "localhost");
        assert_eq!(backend.port, 11434);
        assert_eq!(backend.base_url(), "http://localhost:11434");
        assert_eq!(backend.generate_url(), "http://localhost:11434/api/generate");
    }

    #[test]
    fn test_build_body() {
        let request = LlmRequest::new("Hello", "llama3.2")
            .with_system("Be helpful")
            .with_max_tokens(64);
        let body = OllamaBackend::build_body(&request);

        assert_eq!(body["model"], "llama3.2");
        assert_eq!(body["prompt"], "Hello");
        assert_eq!(body["system"], "Be helpful");
        assert_eq!(body["stream"], true);
        assert_eq!(body["options"]["num_predict"], 64);

        let bare = OllamaBackend::build_body(&LlmRequest::new("Hi", "m"));
        assert!(bare.get("system").is_none());
        assert!(bare["options"].get("num_predict").is_none());
    }

    #[test]
    fn test_parse_generate_line() {
        assert_eq!(
            parse_generate_line(r#"{"response":"Hel","done":false}"#),
            LineEvent::Data {
                fragment: Some("Hel".to_string()),
                done: false
            }
        );
        assert_eq!(
            parse_generate_line(r#"{"response":"","done":true,"eval_count":12}"#),
            LineEvent::Data {
                fragment: Some(String::new()),
                done: true
            }
        );
        assert_eq!(parse_generate_line("   "), LineEvent::Skip);
        assert!(matches!(
            parse_generate_line(r#"{"error":"model not found"}"#),
            LineEvent::Error(e) if e.contains("model not found")
        ));
        assert!(matches!(
            parse_generate_line("{not json"),
            LineEvent::Error(_)
        ));
    }
}
