//! Session state observed by display surfaces

use serde::{Deserialize, Serialize};

/// Where an enhancement cycle currently is
///
/// ```text
/// Idle ──enhance──▶ Enhancing ──first fragment──▶ Streaming ──complete──▶ Settled
///                       │                             │
///                       └──────────failure────────────┴──────────────────▶ Errored
/// ```
///
/// Settled and Errored end a cycle; a new request always re-enters Enhancing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamState {
    /// Nothing requested yet
    #[default]
    Idle,
    /// Request issued, no fragment received
    Enhancing,
    /// At least one fragment received
    Streaming,
    /// Cycle ended in failure
    Errored,
    /// Cycle ended successfully
    Settled,
}

impl StreamState {
    /// Whether a request is in flight
    #[must_use]
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Enhancing | Self::Streaming)
    }

    /// Whether this state ends a cycle
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Errored | Self::Settled)
    }

    /// Short human-readable description
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Enhancing => "enhancing",
            Self::Streaming => "streaming",
            Self::Errored => "failed",
            Self::Settled => "done",
        }
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Everything a display surface needs to render the session
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Current state
    pub state: StreamState,
    /// Accumulated output (or the fallback message after a failure)
    pub output: String,
    /// Activity indicator; lingers briefly after the cycle ends
    pub active: bool,
    /// Cycle number, incremented for every issued request
    pub generation: u64,
}

impl SessionSnapshot {
    /// Whether the enhance action should be disabled
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    /// Whether the output panel should be visible
    #[must_use]
    pub fn shows_output(&self) -> bool {
        !self.output.is_empty() || self.is_busy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_states() {
        assert!(!StreamState::Idle.is_busy());
        assert!(StreamState::Enhancing.is_busy());
        assert!(StreamState::Streaming.is_busy());
        assert!(!StreamState::Errored.is_busy());
        assert!(!StreamState::Settled.is_busy());
    }

    #[test]
    fn test_terminal_states() {
        assert!(StreamState::Errored.is_terminal());
        assert!(StreamState::Settled.is_terminal());
        assert!(!StreamState::Streaming.is_terminal());
        assert_eq!(StreamState::Settled.to_string(), "done");
    }

    #[test]
    fn test_output_visibility() {
        let mut snapshot = SessionSnapshot::default();
        assert!(!snapshot.shows_output());

        snapshot.state = StreamState::Enhancing;
        assert!(snapshot.shows_output());

        snapshot.state = StreamState::Settled;
        snapshot.output = "done".to_string();
        assert!(snapshot.shows_output());
    }
}
