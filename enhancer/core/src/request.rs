//! Enhancement requests
//!
//! One [`EnhancementRequest`] is created per user action. The request is
//! immutable once built and is handed to the producer by value.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Request Identity
// ============================================================================

/// Unique identifier for an enhancement request, used to correlate log lines
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Create a new unique request ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form: first 8 chars of UUID
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}

// ============================================================================
// Request
// ============================================================================

/// A single request to rewrite a raw idea with a profile
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancementRequest {
    /// Correlation id
    pub id: RequestId,
    /// The idea exactly as the user typed it
    pub raw_input: String,
    /// Profile key; empty selects the default profile
    pub profile_key: String,
}

impl EnhancementRequest {
    /// Build a request for `raw_input`
    ///
    /// Returns `None` when the input is empty after trimming, since such a
    /// request is never issued.
    pub fn new(raw_input: impl Into<String>, profile_key: impl Into<String>) -> Option<Self> {
        let raw_input = raw_input.into();
        if raw_input.trim().is_empty() {
            return None;
        }
        Some(Self {
            id: RequestId::new(),
            raw_input,
            profile_key: profile_key.into(),
        })
    }

    /// The user-level prompt sent to the model
    #[must_use]
    pub fn user_prompt(&self) -> String {
        format!(
            "Please enhance this prompt:\n\n\"{}\"\n\nProvide only the enhanced prompt, no explanations or preamble.",
            self.raw_input
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_blank_input_is_rejected() {
        assert!(EnhancementRequest::new("", "portfolio").is_none());
        assert!(EnhancementRequest::new("  \n\t ", "").is_none());
    }

    #[test]
    fn test_input_is_kept_verbatim() {
        let request = EnhancementRequest::new("  Sell shoes online ", "ecommerce").unwrap();
        assert_eq!(request.raw_input, "  Sell shoes online ");
        assert_eq!(request.profile_key, "ecommerce");
    }

    #[test]
    fn test_user_prompt_wraps_input() {
        let request = EnhancementRequest::new("idea", "").unwrap();
        assert_eq!(
            request.user_prompt(),
            "Please enhance this prompt:\n\n\"idea\"\n\nProvide only the enhanced prompt, no explanations or preamble."
        );
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 8);
    }
}
