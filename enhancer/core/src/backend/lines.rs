//! Line-delimited response pumping shared by the HTTP backends.
//!
//! Both provider wire formats are line oriented (NDJSON for Ollama, SSE for
//! OpenAI-compatible APIs). Chunks from the HTTP body are split on `\n`
//! before decoding, so a multi-byte character cut across two chunks is
//! reassembled intact.

use std::fmt::Display;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use super::traits::StreamingToken;

/// What a single provider line means for the stream
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LineEvent {
    /// A text fragment, possibly empty, and whether the provider is done
    Data {
        /// Fragment text (`None` when the line carries no text)
        fragment: Option<String>,
        /// Provider signalled completion
        done: bool,
    },
    /// The provider reported an error or sent something unparseable
    Error(String),
    /// Keep-alive, comment, or metadata line
    Skip,
}

/// Accumulates raw body bytes and yields complete lines
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    /// Append a chunk of body bytes
    pub(crate) fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pop the next complete line (without the trailing `\n` / `\r\n`)
    pub(crate) fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Whatever is left once the body has ended
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.buf.iter().all(u8::is_ascii_whitespace) {
            self.buf.clear();
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Outcome of feeding one line through the pump
enum Step {
    Continue,
    Stop,
}

/// Spawn a task that turns a response body into [`StreamingToken`]s
///
/// Exactly one terminal token is sent unless the receiver is dropped first.
/// A body that ends without the provider's completion marker is reported as
/// an error.
pub(crate) fn spawn_line_pump<S, B, E>(
    mut body: S,
    parse: fn(&str) -> LineEvent,
    tx: mpsc::Sender<StreamingToken>,
) where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = LineBuffer::default();
        let mut full_response = String::new();

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    lines.extend(bytes.as_ref());
                    while let Some(line) = lines.next_line() {
                        if let Step::Stop = feed(&line, parse, &tx, &mut full_response).await {
                            return;
                        }
                    }
                }
                Err(e) => {
                    send_last(&tx, StreamingToken::Error(e.to_string())).await;
                    return;
                }
            }
        }

        if let Some(line) = lines.finish() {
            if let Step::Stop = feed(&line, parse, &tx, &mut full_response).await {
                return;
            }
        }

        send_last(
            &tx,
            StreamingToken::Error("Response ended before the completion marker".to_string()),
        )
        .await;
    });
}

/// Send the stream's terminal token; `false` if nobody is listening anymore
async fn send_last(tx: &mpsc::Sender<StreamingToken>, token: StreamingToken) -> bool {
    let delivered = tx.send(token).await.is_ok();
    if !delivered {
        tracing::trace!("Token receiver dropped before the terminal token");
    }
    delivered
}

async fn feed(
    line: &str,
    parse: fn(&str) -> LineEvent,
    tx: &mpsc::Sender<StreamingToken>,
    full_response: &mut String,
) -> Step {
    match parse(line) {
        LineEvent::Skip => Step::Continue,
        LineEvent::Error(error) => {
            send_last(tx, StreamingToken::Error(error)).await;
            Step::Stop
        }
        LineEvent::Data { fragment, done } => {
            if let Some(text) = fragment.filter(|t| !t.is_empty()) {
                full_response.push_str(&text);
                if tx.send(StreamingToken::Token(text)).await.is_err() {
                    tracing::trace!("Token receiver dropped, stopping pump");
                    return Step::Stop;
                }
            }
            if done {
                send_last(
                    tx,
                    StreamingToken::Complete {
                        message: std::mem::take(full_response),
                    },
                )
                .await;
                return Step::Stop;
            }
            Step::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_words(line: &str) -> LineEvent {
        match line {
            "" => LineEvent::Skip,
            "END" => LineEvent::Data {
                fragment: None,
                done: true,
            },
            "BAD" => LineEvent::Error("bad line".to_string()),
            text => LineEvent::Data {
                fragment: Some(text.to_string()),
                done: false,
            },
        }
    }

    async fn drain(mut rx: mpsc::Receiver<StreamingToken>) -> Vec<StreamingToken> {
        let mut out = Vec::new();
        while let Some(token) = rx.recv().await {
            out.push(token);
        }
        out
    }

    #[test]
    fn test_line_buffer_splits_across_chunks() {
        let mut buf = LineBuffer::default();
        buf.extend(b"hel");
        assert_eq!(buf.next_line(), None);
        buf.extend(b"lo\r\nwor");
        assert_eq!(buf.next_line(), Some("hello".to_string()));
        assert_eq!(buf.next_line(), None);
        buf.extend(b"ld\n");
        assert_eq!(buf.next_line(), Some("world".to_string()));
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn test_line_buffer_keeps_split_utf8_intact() {
        let text = "caf\u{e9}\n".as_bytes();
        let mut buf = LineBuffer::default();
        buf.extend(&text[..4]);
        buf.extend(&text[4..]);
        assert_eq!(buf.next_line(), Some("caf\u{e9}".to_string()));
    }

    #[test]
    fn test_line_buffer_finish_returns_tail() {
        let mut buf = LineBuffer::default();
        buf.extend(b"tail");
        assert_eq!(buf.next_line(), None);
        assert_eq!(buf.finish(), Some("tail".to_string()));
    }

    #[tokio::test]
    async fn test_pump_emits_tokens_then_complete() {
        let chunks: Vec<Result<&'static [u8], String>> =
            vec![Ok(&b"Hello \n\nwor"[..]), Ok(&b"ld\nEND\nignored\n"[..])];
        let (tx, rx) = mpsc::channel(16);
        spawn_line_pump(futures::stream::iter(chunks), parse_words, tx);

        assert_eq!(
            drain(rx).await,
            vec![
                StreamingToken::Token("Hello ".to_string()),
                StreamingToken::Token("world".to_string()),
                StreamingToken::Complete {
                    message: "Hello world".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_pump_reports_parse_error() {
        let chunks: Vec<Result<&'static [u8], String>> = vec![Ok(&b"one\nBAD\ntwo\n"[..])];
        let (tx, rx) = mpsc::channel(16);
        spawn_line_pump(futures::stream::iter(chunks), parse_words, tx);

        assert_eq!(
            drain(rx).await,
            vec![
                StreamingToken::Token("one".to_string()),
                StreamingToken::Error("bad line".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_pump_reports_transport_error() {
        let chunks: Vec<Result<&'static [u8], String>> =
            vec![Ok(&b"one\n"[..]), Err("connection reset".to_string())];
        let (tx, rx) = mpsc::channel(16);
        spawn_line_pump(futures::stream::iter(chunks), parse_words, tx);

        assert_eq!(
            drain(rx).await,
            vec![
                StreamingToken::Token("one".to_string()),
                StreamingToken::Error("connection reset".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_pump_truncated_body_is_an_error() {
        let chunks: Vec<Result<&'static [u8], String>> = vec![Ok(&b"one\ntwo"[..])];
        let (tx, rx) = mpsc::channel(16);
        spawn_line_pump(futures::stream::iter(chunks), parse_words, tx);

        let tokens = drain(rx).await;
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1], StreamingToken::Token("two".to_string()));
        assert!(matches!(tokens[2], StreamingToken::Error(_)));
    }

    #[tokio::test]
    async fn test_send_last_reports_dropped_receiver() {
        let (tx, mut rx) = mpsc::channel(1);
        assert!(send_last(&tx, StreamingToken::Error("first".to_string())).await);
        assert_eq!(rx.recv().await, Some(StreamingToken::Error("first".to_string())));

        drop(rx);
        assert!(!send_last(&tx, StreamingToken::Error("second".to_string())).await);
    }
}
