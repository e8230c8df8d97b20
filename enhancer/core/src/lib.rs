//! Enhancer Core - Streaming Prompt Enhancement
//!
//! This crate turns a short idea plus a transformation profile into a
//! detailed prompt, streaming the model's rewrite to a display surface as it
//! is generated. It has no UI dependencies; the `prompt-enhancer` binary is
//! one surface, tests are another.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Display Surface                           │
//! │               (CLI renderer, test harness, ...)                  │
//! │                  subscribe() / snapshot()                        │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │ SessionSnapshot (watch)
//! ┌───────────────────────────────┴──────────────────────────────────┐
//! │                     EnhancementSession                           │
//! │   enhance(raw_input, profile_key) ── generation-tagged cycles    │
//! │        ▲                                                         │
//! │        │ StreamReader                                            │
//! │  ┌─────┴────────┐      ┌──────────────────────┐                  │
//! │  │ StreamChannel│◀─────│ EnhancementProducer  │──▶ profiles      │
//! │  └──────────────┘      └──────────┬───────────┘                  │
//! └───────────────────────────────────┼──────────────────────────────┘
//!                                     │ LlmRequest / StreamingToken
//!                         ┌───────────┴───────────┐
//!                         │      LlmBackend       │
//!                         │  (OpenAI, Ollama)     │
//!                         └───────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`EnhancementSession`]: drives cycles and publishes [`SessionSnapshot`]s
//! - [`EnhancementProducer`]: issues one streaming backend call per request
//! - [`StreamWriter`] / [`StreamReader`]: the fragment channel between them
//! - [`PromptProfile`]: named instructions selected by key
//! - [`LlmBackend`]: provider abstraction
//!
//! # Quick Start
//!
//! ```ignore
//! use enhancer_core::{
//!     backend::OllamaBackend, EnhancementProducer, EnhancementSession, ProducerConfig,
//!     SessionConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let producer = EnhancementProducer::new(OllamaBackend::default(), ProducerConfig::default());
//!     let session = EnhancementSession::new(producer, SessionConfig::default());
//!
//!     let mut updates = session.subscribe();
//!     let done = session.enhance("A photography portfolio", "portfolio").unwrap();
//!
//!     while updates.changed().await.is_ok() {
//!         let snapshot = updates.borrow_and_update().clone();
//!         println!("{}: {}", snapshot.state, snapshot.output);
//!         if snapshot.state.is_terminal() {
//!             break;
//!         }
//!     }
//!     done.await.unwrap();
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: LLM backend abstraction (OpenAI-compatible, Ollama)
//! - [`channel`]: single-producer, single-consumer fragment channel
//! - [`config`]: TOML / environment / CLI configuration
//! - [`producer`]: enhancement stream producer
//! - [`profiles`]: profile registry
//! - [`request`]: enhancement requests and ids
//! - [`session`]: client consumption loop
//! - [`state`]: observable session state

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod channel;
pub mod config;
pub mod producer;
pub mod profiles;
pub mod request;
pub mod session;
pub mod state;

// Re-exports for convenience
pub use backend::{
    BackendConfig, LlmBackend, LlmRequest, OllamaBackend, OpenAiBackend, StreamingToken,
};
pub use channel::{stream_channel, ChannelError, StreamOutcome, StreamReader, StreamWriter};
pub use producer::{EnhancementProducer, EnhancementStream, ProducerConfig};
pub use profiles::{default_profile, profiles, resolve, PromptProfile};
pub use request::{EnhancementRequest, RequestId};
pub use session::{EnhancementSession, SessionConfig, FALLBACK_MESSAGE};
pub use state::{SessionSnapshot, StreamState};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, load_config_with_env, BackendKind,
    ConfigError, ConfigOverrides, ConfigSource, EnhancerConfigFile, EnhancerToml,
};
