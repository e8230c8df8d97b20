//! OpenAI-compatible Backend Implementation
//!
//! Streams `POST {base_url}/chat/completions` responses delivered as
//! server-sent events. Works against OpenAI itself and any server exposing the
//! same API shape (Ollama's `/v1`, vLLM, LM Studio, ...).
//!
//! Stream format:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Create "}}]}
//!
//! data: {"choices":[{"delta":{"content":"a minimal "}}]}
//!
//! data: [DONE]
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::lines::{spawn_line_pump, LineEvent};
use super::traits::{LlmBackend, LlmRequest, StreamingToken};

/// OpenAI-compatible chat completions client
#[derive(Clone)]
pub struct OpenAiBackend {
    /// Base URL including version prefix, without trailing slash
    base_url: String,
    /// Bearer token
    api_key: Option<String>,
    /// HTTP client
    http_client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl OpenAiBackend {
    /// Create a new backend
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            http_client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.base_url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key {
            Some(ref key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Build the JSON body for a streaming chat completion
    fn build_body(request: &LlmRequest) -> serde_json::Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = request.system {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": request.prompt }));

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "stream": true,
            "temperature": request.temperature,
        });
        if request.max_tokens > 0 {
            body["max_tokens"] = serde_json::json!(request.max_tokens);
        }
        body
    }
}

/// Interpret one SSE line from a chat completions stream
pub(crate) fn parse_sse_line(line: &str) -> LineEvent {
    let line = line.trim();
    // Blank lines separate events; ':' lines are comments/keep-alives
    if line.is_empty() || line.starts_with(':') {
        return LineEvent::Skip;
    }

    let Some(data) = line.strip_prefix("data:") else {
        // event:, id:, retry: carry nothing we use
        return LineEvent::Skip;
    };
    let data = data.trim_start();

    if data == "[DONE]" {
        return LineEvent::Data {
            fragment: None,
            done: true,
        };
    }

    let value: serde_json::Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => return LineEvent::Error(format!("Malformed completion chunk: {e}")),
    };

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map_or_else(|| error.to_string(), String::from);
        return LineEvent::Error(format!("Provider error: {message}"));
    }

    let fragment = value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
        .map(String::from);

    LineEvent::Data {
        fragment,
        done: false,
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn health_check(&self) -> bool {
        self.authorize(self.http_client.get(self.models_url()))
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
            .authorize(self.http_client.post(self.completions_url()))
            .json(&Self::build_body(request))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Completion API returned {status}: {body}");
        }

        tracing::debug!(model = %request.model, "Completion stream opened");
        spawn_line_pump(response.bytes_stream(), parse_sse_line, tx);

        Ok(rx)
    }
}
