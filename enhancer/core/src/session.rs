//! Client Consumption Loop
//!
//! [`EnhancementSession`] owns the observable state of the enhancement UI.
//! Each [`enhance`](EnhancementSession::enhance) call opens a new cycle:
//!
//! 1. output cleared, state `Enhancing`, activity indicator on
//! 2. first fragment moves the state to `Streaming`; every fragment is
//!    appended and republished
//! 3. the terminal signal settles the cycle (`Settled` or `Errored`)
//! 4. after `indicator_linger` the activity indicator turns off
//!
//! # Supersession
//!
//! Every cycle carries a generation number. Starting a new cycle aborts the
//! previous producer, and the previous consumer drops any fragment, terminal
//! signal, or indicator clear whose generation is no longer current.
//!
//! Snapshots are published through a `tokio::sync::watch` store, so a display
//! surface may either [`subscribe`](EnhancementSession::subscribe) or poll
//! [`snapshot`](EnhancementSession::snapshot).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};

use crate::backend::LlmBackend;
use crate::channel::{ChannelError, StreamOutcome, StreamReader};
use crate::producer::EnhancementProducer;
use crate::request::EnhancementRequest;
use crate::state::{SessionSnapshot, StreamState};

/// Output shown after any failed cycle
pub const FALLBACK_MESSAGE: &str = "Failed to enhance prompt. Please try again.";

/// Session settings
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// How long the activity indicator stays on after a cycle ends
    pub indicator_linger: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            indicator_linger: Duration::from_millis(1000),
        }
    }
}

/// Bookkeeping for the cycle in flight
#[derive(Debug, Default)]
struct Inflight {
    generation: u64,
    producer: Option<AbortHandle>,
}

/// Drives enhancement cycles and publishes their state
pub struct EnhancementSession<B: LlmBackend> {
    producer: EnhancementProducer<B>,
    config: SessionConfig,
    store: Arc<watch::Sender<SessionSnapshot>>,
    inflight: Mutex<Inflight>,
}

impl<B: LlmBackend + 'static> EnhancementSession<B> {
    /// Create an idle session
    pub fn new(producer: EnhancementProducer<B>, config: SessionConfig) -> Self {
        let (store, _) = watch::channel(SessionSnapshot::default());
        Self {
            producer,
            config,
            store: Arc::new(store),
            inflight: Mutex::new(Inflight::default()),
        }
    }

    /// Start a new enhancement cycle
    ///
    /// Blank input is ignored: no state change, no backend call, `None`
    /// returned. Otherwise the returned handle resolves once the cycle's
    /// consumer has finished, including the indicator linger. Must be called
    /// from within a Tokio runtime.
    pub fn enhance(&self, raw_input: &str, profile_key: &str) -> Option<JoinHandle<()>> {
        let Some(request) = EnhancementRequest::new(raw_input, profile_key) else {
            tracing::trace!("Ignoring blank enhancement input");
            return None;
        };

        let mut inflight = self.inflight.lock();
        if let Some(previous) = inflight.producer.take() {
            tracing::debug!(generation = inflight.generation, "Superseding enhancement");
            previous.abort();
        }
        inflight.generation += 1;
        let generation = inflight.generation;

        self.store.send_modify(|snapshot| {
            snapshot.state = StreamState::Enhancing;
            snapshot.output.clear();
            snapshot.active = true;
            snapshot.generation = generation;
        });

        let stream = self.producer.produce(request);
        inflight.producer = Some(stream.abort);
        drop(inflight);

        let consumer = Consumer {
            store: Arc::clone(&self.store),
            generation,
            linger: self.config.indicator_linger,
        };
        Some(tokio::spawn(consumer.run(stream.reader)))
    }

    /// Watch every published snapshot
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.store.subscribe()
    }

    /// Current snapshot
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.store.borrow().clone()
    }

    /// Whether a request is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.store.borrow().is_busy()
    }

    /// Whether the output panel should be visible
    #[must_use]
    pub fn shows_output(&self) -> bool {
        self.store.borrow().shows_output()
    }
}

impl<B: LlmBackend> Drop for EnhancementSession<B> {
    fn drop(&mut self) {
        if let Some(producer) = self.inflight.get_mut().producer.take() {
            producer.abort();
        }
    }
}

// ============================================================================
// Consumer Task
// ============================================================================

/// Drains one cycle's channel into the store
struct Consumer {
    store: Arc<watch::Sender<SessionSnapshot>>,
    generation: u64,
    linger: Duration,
}

impl Consumer {
    async fn run(self, mut reader: StreamReader) {
        while let Some(fragment) = reader.next_fragment().await {
            let current = self.update(|snapshot| {
                snapshot.state = StreamState::Streaming;
                snapshot.output.push_str(&fragment);
            });
            if !current {
                tracing::trace!(generation = self.generation, "Dropping stale fragment");
                return;
            }
        }

        let outcome = reader
            .outcome()
            .cloned()
            .unwrap_or_else(|| StreamOutcome::Failed(ChannelError::Disconnected.to_string()));

        let current = self.update(|snapshot| match outcome {
            StreamOutcome::Completed => snapshot.state = StreamState::Settled,
            StreamOutcome::Failed(_) => {
                snapshot.state = StreamState::Errored;
                snapshot.output = FALLBACK_MESSAGE.to_string();
            }
        });
        if !current {
            return;
        }

        tokio::time::sleep(self.linger).await;
        self.update(|snapshot| snapshot.active = false);
    }

    /// Apply `change` if this consumer's cycle is still the current one
    fn update(&self, change: impl FnOnce(&mut SessionSnapshot)) -> bool {
        self.store.send_if_modified(|snapshot| {
            if snapshot.generation != self.generation {
                return false;
            }
            change(snapshot);
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LlmRequest, StreamingToken};
    use crate::producer::ProducerConfig;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    struct Echo;

    #[async_trait]
    impl LlmBackend for Echo {
        fn name(&self) -> &str {
            "Echo"
        }

        async fn health_check(&self) -> bool {
            true
        }

        async fn send_streaming(
            &self,
            request: &LlmRequest,
        ) -> anyhow::Result<mpsc::Receiver<StreamingToken>> {
            let (tx, rx) = mpsc::channel(4);
            tx.send(StreamingToken::Token("echo".into())).await?;
            tx.send(StreamingToken::Complete {
                message: request.prompt.clone(),
            })
            .await?;
            Ok(rx)
        }
    }

    fn session(linger_ms: u64) -> EnhancementSession<Echo> {
        EnhancementSession::new(
            EnhancementProducer::new(Echo, ProducerConfig::default()),
            SessionConfig {
                indicator_linger: Duration::from_millis(linger_ms),
            },
        )
    }

    #[tokio::test]
    async fn test_initial_snapshot_is_idle() {
        let session = session(0);
        assert_eq!(session.snapshot(), SessionSnapshot::default());
        assert!(!session.is_busy());
        assert!(!session.shows_output());
    }

    #[tokio::test]
    async fn test_blank_input_is_a_noop() {
        let session = session(0);
        assert!(session.enhance("", "portfolio").is_none());
        assert!(session.enhance("   ", "").is_none());
        assert_eq!(session.snapshot(), SessionSnapshot::default());
    }

    #[tokio::test]
    async fn test_enhance_enters_enhancing_immediately() {
        let session = session(0);
        let handle = session.enhance("idea", "").unwrap();

        // The consumer task has not been polled yet on the current-thread runtime
        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, StreamState::Enhancing);
        assert_eq!(snapshot.output, "");
        assert!(snapshot.active);
        assert_eq!(snapshot.generation, 1);
        assert!(session.shows_output());

        handle.await.unwrap();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, StreamState::Settled);
        assert_eq!(snapshot.output, "echo");
        assert!(!snapshot.active);
    }

    #[tokio::test]
    async fn test_generation_increments_per_cycle() {
        let session = session(0);
        session.enhance("one", "").unwrap().await.unwrap();
        session.enhance("two", "").unwrap().await.unwrap();
        assert_eq!(session.snapshot().generation, 2);
    }
}
