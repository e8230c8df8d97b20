//! Enhancement Stream Producer
//!
//! Turns one [`EnhancementRequest`] into one streaming backend call and
//! republishes the model's fragments onto a [`StreamWriter`]. Every failure
//! (connect error, HTTP status, malformed stream, provider error, missing
//! completion marker, timeout) becomes a single failure signal on the
//! channel; nothing is retried and nothing escapes as a panic.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::AbortHandle;

use crate::backend::{LlmBackend, LlmRequest, StreamingToken};
use crate::channel::{stream_channel, StreamReader, StreamWriter, DEFAULT_CHANNEL_CAPACITY};
use crate::profiles;
use crate::request::{EnhancementRequest, RequestId};

/// Producer settings
#[derive(Clone, Debug)]
pub struct ProducerConfig {
    /// Model identifier passed to the backend
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens to generate (0 = backend default)
    pub max_tokens: u32,
    /// Upper bound on a whole backend call (`None` = unbounded)
    pub request_timeout: Option<Duration>,
    /// Fragments buffered between producer and consumer
    pub channel_capacity: usize,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 0,
            request_timeout: Some(Duration::from_secs(120)),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// A running production: the read end of its channel plus a way to stop it
#[derive(Debug)]
pub struct EnhancementStream {
    /// Request being served
    pub id: RequestId,
    /// Fragments and the terminal outcome
    pub reader: StreamReader,
    /// Aborts the producer task; the reader then observes a failure
    pub abort: AbortHandle,
}

/// Issues enhancement requests against a backend
pub struct EnhancementProducer<B: LlmBackend> {
    backend: Arc<B>,
    config: ProducerConfig,
}

impl<B: LlmBackend + 'static> EnhancementProducer<B> {
    /// Create a producer over `backend`
    pub fn new(backend: B, config: ProducerConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            config,
        }
    }

    /// The backend in use
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The backend call `request` turns into
    #[must_use]
    pub fn build_llm_request(&self, request: &EnhancementRequest) -> LlmRequest {
        let profile = profiles::resolve(&request.profile_key);
        LlmRequest::new(request.user_prompt(), self.config.model.clone())
            .with_system(profile.instructions)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
    }

    /// Start streaming an enhancement
    ///
    /// The work runs on a detached task; the returned stream is the only
    /// handle to it. Must be called from within a Tokio runtime.
    pub fn produce(&self, request: EnhancementRequest) -> EnhancementStream {
        let (writer, reader) = stream_channel(self.config.channel_capacity);
        let llm_request = self.build_llm_request(&request);
        let backend = Arc::clone(&self.backend);
        let timeout = self.config.request_timeout;
        let id = request.id;

        tracing::debug!(
            request_id = %id,
            profile = %request.profile_key,
            backend = backend.name(),
            model = %llm_request.model,
            "Starting enhancement"
        );

        let task = tokio::spawn(async move {
            let result = match timeout {
                Some(limit) => tokio::time::timeout(limit, relay(&*backend, &llm_request, &writer))
                    .await
                    .unwrap_or_else(|_| {
                        Err(format!("Request timed out after {}s", limit.as_secs_f32()))
                    }),
                None => relay(&*backend, &llm_request, &writer).await,
            };

            match result {
                Ok(fragments) => {
                    tracing::info!(request_id = %id, fragments, "Enhancement complete");
                    writer.complete().await;
                }
                Err(error) => {
                    tracing::warn!(request_id = %id, error = %error, "Enhancement failed");
                    writer.fail(error).await;
                }
            }
        });

        EnhancementStream {
            id,
            reader,
            abort: task.abort_handle(),
        }
    }
}

/// Forward backend tokens to the channel, returning the fragment count
async fn relay<B: LlmBackend + ?Sized>(
    backend: &B,
    request: &LlmRequest,
    writer: &StreamWriter,
) -> Result<usize, String> {
    let mut rx = backend
        .send_streaming(request)
        .await
        .map_err(|e| format!("{e:#}"))?;

    let mut fragments = 0;
    while let Some(token) = rx.recv().await {
        match token {
            StreamingToken::Token(text) => {
                if text.is_empty() {
                    continue;
                }
                writer.write(text).await.map_err(|e| e.to_string())?;
                fragments += 1;
            }
            StreamingToken::Complete { .. } => return Ok(fragments),
            StreamingToken::Error(error) => return Err(error),
        }
    }

    Err("Backend stream closed without completion".to_string())
}
