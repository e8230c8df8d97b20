//! Stream Channel
//!
//! Single-producer, single-consumer pipe carrying ordered text fragments
//! followed by exactly one terminal signal.
//!
//! ```text
//! StreamWriter ──write("a")──write("b")──complete()──▶ StreamReader
//!                                                       next_fragment() -> "a", "b", None
//!                                                       outcome()       -> Completed
//! ```
//!
//! The terminal methods consume the writer, so a second terminal signal or a
//! write after termination cannot be expressed. A writer dropped without a
//! terminal signal is observed by the reader as a failure.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use futures::Stream;
use thiserror::Error;
use tokio::sync::mpsc;

/// Default number of fragments buffered between writer and reader
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Errors surfaced by the channel
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The reading side went away; further writes are pointless
    #[error("stream reader dropped")]
    ReaderDropped,

    /// The writing side went away without completing or failing
    #[error("stream writer dropped before signalling completion")]
    Disconnected,
}

/// How a drained stream ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The writer called [`StreamWriter::complete`]
    Completed,
    /// The writer failed or disappeared
    Failed(String),
}

impl StreamOutcome {
    /// Whether the stream completed normally
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[derive(Debug)]
enum Signal {
    Fragment(String),
    Completed,
    Failed(String),
}

/// Create a connected writer/reader pair
///
/// `capacity` bounds how many fragments may be in flight; a value of zero is
/// raised to one.
#[must_use]
pub fn stream_channel(capacity: usize) -> (StreamWriter, StreamReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let failed = Arc::new(AtomicBool::new(false));
    (
        StreamWriter {
            tx,
            failed: Arc::clone(&failed),
        },
        StreamReader {
            rx,
            failed,
            outcome: None,
        },
    )
}

// ============================================================================
// Writer
// ============================================================================

/// Producing half of a stream channel
#[derive(Debug)]
pub struct StreamWriter {
    tx: mpsc::Sender<Signal>,
    failed: Arc<AtomicBool>,
}

impl StreamWriter {
    /// Append a fragment
    ///
    /// Waits while the buffer is full.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::ReaderDropped`] if the reader no longer exists.
    pub async fn write(&self, fragment: impl Into<String>) -> Result<(), ChannelError> {
        self.tx
            .send(Signal::Fragment(fragment.into()))
            .await
            .map_err(|_| ChannelError::ReaderDropped)
    }

    /// Signal successful completion
    pub async fn complete(self) {
        if self.tx.send(Signal::Completed).await.is_err() {
            tracing::trace!("Reader dropped before completion");
        }
    }

    /// Signal failure
    ///
    /// Fragments the reader has not yet taken are discarded.
    pub async fn fail(self, error: impl Into<String>) {
        self.failed.store(true, Ordering::Release);
        if self.tx.send(Signal::Failed(error.into())).await.is_err() {
            tracing::trace!("Reader dropped before failure");
        }
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Consuming half of a stream channel
///
/// Yields fragments in write order until the terminal signal arrives, then
/// yields nothing. The sequence cannot be restarted.
#[derive(Debug)]
pub struct StreamReader {
    rx: mpsc::Receiver<Signal>,
    failed: Arc<AtomicBool>,
    outcome: Option<StreamOutcome>,
}

impl StreamReader {
    /// Wait for the next fragment
    ///
    /// Returns `None` once the stream has ended; [`outcome`](Self::outcome)
    /// then tells how.
    pub async fn next_fragment(&mut self) -> Option<String> {
        std::future::poll_fn(|cx| self.poll_fragment(cx)).await
    }

    /// How the stream ended, or `None` while it is still open
    #[must_use]
    pub fn outcome(&self) -> Option<&StreamOutcome> {
        self.outcome.as_ref()
    }

    fn poll_fragment(&mut self, cx: &mut Context<'_>) -> Poll<Option<String>> {
        loop {
            if self.outcome.is_some() {
                return Poll::Ready(None);
            }

            match ready!(self.rx.poll_recv(cx)) {
                Some(Signal::Fragment(fragment)) => {
                    if self.failed.load(Ordering::Acquire) {
                        continue;
                    }
                    return Poll::Ready(Some(fragment));
                }
                Some(Signal::Completed) => self.finish(StreamOutcome::Completed),
                Some(Signal::Failed(error)) => self.finish(StreamOutcome::Failed(error)),
                None => {
                    self.finish(StreamOutcome::Failed(ChannelError::Disconnected.to_string()));
                }
            }
        }
    }

    fn finish(&mut self, outcome: StreamOutcome) {
        self.outcome = Some(outcome);
        self.rx.close();
    }
}

impl Stream for StreamReader {
    type Item = String;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_fragment(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_fragments_arrive_in_order_then_complete() {
        let (writer, mut reader) = stream_channel(8);
        writer.write("Create ").await.unwrap();
        writer.write("a minimal ").await.unwrap();
        writer.write("portfolio.").await.unwrap();
        writer.complete().await;

        assert!(reader.outcome().is_none());
        let mut text = String::new();
        while let Some(fragment) = reader.next_fragment().await {
            text.push_str(&fragment);
        }
        assert_eq!(text, "Create a minimal portfolio.");
        assert_eq!(reader.outcome(), Some(&StreamOutcome::Completed));

        // Exhausted readers stay exhausted
        assert_eq!(reader.next_fragment().await, None);
    }

    #[tokio::test]
    async fn test_fail_discards_unread_fragments() {
        let (writer, mut reader) = stream_channel(8);
        writer.write("Build ").await.unwrap();
        assert_eq!(reader.next_fragment().await.as_deref(), Some("Build "));

        writer.write("never seen").await.unwrap();
        writer.fail("provider exploded").await;

        assert_eq!(reader.next_fragment().await, None);
        assert_eq!(
            reader.outcome(),
            Some(&StreamOutcome::Failed("provider exploded".to_string()))
        );
    }

    #[tokio::test]
    async fn test_dropped_writer_is_a_failure() {
        let (writer, mut reader) = stream_channel(8);
        writer.write("partial").await.unwrap();
        drop(writer);

        assert_eq!(reader.next_fragment().await.as_deref(), Some("partial"));
        assert_eq!(reader.next_fragment().await, None);
        assert_eq!(
            reader.outcome(),
            Some(&StreamOutcome::Failed(ChannelError::Disconnected.to_string()))
        );
    }

    #[tokio::test]
    async fn test_write_after_reader_dropped() {
        let (writer, reader) = stream_channel(8);
        drop(reader);
        assert_eq!(writer.write("x").await, Err(ChannelError::ReaderDropped));
        // Terminal signals to a missing reader are dropped quietly
        writer.complete().await;
    }

    #[tokio::test]
    async fn test_reader_as_stream() {
        let (writer, reader) = stream_channel(1);
        let producer = tokio::spawn(async move {
            for word in ["one ", "two ", "three"] {
                writer.write(word).await.unwrap();
            }
            writer.complete().await;
        });

        let fragments: Vec<String> = reader.collect().await;
        producer.await.unwrap();
        assert_eq!(fragments, vec!["one ", "two ", "three"]);
    }

    #[tokio::test]
    async fn test_zero_capacity_is_usable() {
        let (writer, mut reader) = stream_channel(0);
        writer.write("x").await.unwrap();
        assert_eq!(reader.next_fragment().await.as_deref(), Some("x"));
    }
}
