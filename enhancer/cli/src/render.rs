//! Terminal rendering of session snapshots
//!
//! Output is written incrementally: while the accumulated text only grows,
//! just the new suffix is printed. If the text is replaced (the failure
//! fallback), the replacement is printed on a fresh line.

use std::io::{self, Write};

use enhancer_core::SessionSnapshot;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

/// Writes snapshot output to a terminal-like sink
pub struct Renderer<W: Write> {
    out: W,
    printed: String,
}

impl<W: Write> Renderer<W> {
    /// Render into `out`
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed: String::new(),
        }
    }

    /// Print whatever changed since the last snapshot
    pub fn apply(&mut self, snapshot: &SessionSnapshot) -> io::Result<()> {
        if snapshot.output == self.printed {
            return Ok(());
        }

        match snapshot.output.strip_prefix(self.printed.as_str()) {
            Some(delta) => self.out.write_all(delta.as_bytes())?,
            None => {
                if !self.printed.is_empty() {
                    writeln!(self.out)?;
                }
                self.out.write_all(snapshot.output.as_bytes())?;
            }
        }
        self.printed.clone_from(&snapshot.output);
        self.out.flush()
    }

    /// Terminate the last line
    pub fn finish(&mut self) -> io::Result<()> {
        if !self.printed.is_empty() && !self.printed.ends_with('\n') {
            writeln!(self.out)?;
        }
        self.out.flush()
    }

    /// Recover the sink
    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Render snapshots until the cycle ends, returning the final snapshot
///
/// Intermediate snapshots may be coalesced by the watch channel. A terminal
/// state persists until the next cycle starts, so it is never missed.
pub async fn follow<W: Write>(
    updates: watch::Receiver<SessionSnapshot>,
    renderer: &mut Renderer<W>,
) -> io::Result<SessionSnapshot> {
    let mut snapshots = WatchStream::new(updates);
    let mut last = SessionSnapshot::default();

    while let Some(snapshot) = snapshots.next().await {
        tracing::trace!(state = %snapshot.state, len = snapshot.output.len(), "Snapshot");
        renderer.apply(&snapshot)?;
        let done = snapshot.state.is_terminal();
        last = snapshot;
        if done {
            break;
        }
    }

    renderer.finish()?;
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use enhancer_core::StreamState;
    use pretty_assertions::assert_eq;

    fn snapshot(state: StreamState, output: &str) -> SessionSnapshot {
        SessionSnapshot {
            state,
            output: output.to_string(),
            active: true,
            generation: 1,
        }
    }

    fn rendered(renderer: Renderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn test_prints_only_deltas() {
        let mut renderer = Renderer::new(Vec::new());
        renderer.apply(&snapshot(StreamState::Enhancing, "")).unwrap();
        renderer.apply(&snapshot(StreamState::Streaming, "Create ")).unwrap();
        renderer
            .apply(&snapshot(StreamState::Streaming, "Create a minimal "))
            .unwrap();
        renderer
            .apply(&snapshot(StreamState::Settled, "Create a minimal site."))
            .unwrap();
        renderer.finish().unwrap();

        assert_eq!(rendered(renderer), "Create a minimal site.\n");
    }

    #[test]
    fn test_replacement_goes_on_new_line() {
        let mut renderer = Renderer::new(Vec::new());
        renderer.apply(&snapshot(StreamState::Streaming, "Build ")).unwrap();
        renderer
            .apply(&snapshot(
                StreamState::Errored,
                "Failed to enhance prompt. Please try again.",
            ))
            .unwrap();
        renderer.finish().unwrap();

        assert_eq!(
            rendered(renderer),
            "Build \nFailed to enhance prompt. Please try again.\n"
        );
    }

    #[test]
    fn test_nothing_printed_for_empty_output() {
        let mut renderer = Renderer::new(Vec::new());
        renderer.apply(&snapshot(StreamState::Settled, "")).unwrap();
        renderer.finish().unwrap();
        assert_eq!(rendered(renderer), "");
    }

    #[tokio::test]
    async fn test_follow_stops_at_terminal_state() {
        let (tx, rx) = watch::channel(snapshot(StreamState::Enhancing, ""));
        let publisher = tokio::spawn(async move {
            tx.send_replace(snapshot(StreamState::Streaming, "Hello"));
            tokio::task::yield_now().await;
            tx.send_replace(snapshot(StreamState::Settled, "Hello world"));
            // Keep the sender alive past the terminal snapshot
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        });

        let mut renderer = Renderer::new(Vec::new());
        let last = follow(rx, &mut renderer).await.unwrap();
        publisher.await.unwrap();

        assert_eq!(last.state, StreamState::Settled);
        assert_eq!(rendered(renderer), "Hello world\n");
    }
}
