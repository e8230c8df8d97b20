//! LLM Backend Integration
//!
//! Abstracted access to language-model providers through a common trait.
//!
//! # Available Backends
//!
//! - **OpenAI**: any OpenAI-compatible chat completions endpoint (default)
//! - **Ollama**: local LLM server
//!
//! # Usage
//!
//! ```ignore
//! use enhancer_core::backend::{LlmBackend, LlmRequest, OpenAiBackend};
//!
//! let backend = OpenAiBackend::new("https://api.openai.com/v1", api_key);
//! let request = LlmRequest::new("Hello!", "gpt-4o-mini");
//! let rx = backend.send_streaming(&request).await?;
//! ```

mod lines;
mod ollama;
mod openai;
mod traits;

pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;
pub use traits::{BackendConfig, LlmBackend, LlmRequest, StreamingToken};
