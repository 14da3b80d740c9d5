//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of an EPP session
///
/// ```text
/// Disconnected -> Connected -> Ready -> Authenticated -> Closed
/// ```
///
/// `Connected` lasts only until the greeting arrives. Any transport failure
/// jumps straight to `Closed`, which is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No channel yet
    Disconnected,
    /// Channel open, greeting not yet received
    Connected,
    /// Greeting received, not logged in
    Ready,
    /// Logged in; commands may be sent
    Authenticated,
    /// Channel closed; the session cannot be reused
    Closed,
}

impl SessionState {
    /// Whether the session holds an open channel
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            SessionState::Connected | SessionState::Ready | SessionState::Authenticated
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::Ready => "ready",
            SessionState::Authenticated => "authenticated",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_states() {
        assert!(!SessionState::Disconnected.is_open());
        assert!(SessionState::Connected.is_open());
        assert!(SessionState::Ready.is_open());
        assert!(SessionState::Authenticated.is_open());
        assert!(!SessionState::Closed.is_open());
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionState::Authenticated.to_string(), "authenticated");
    }
}
