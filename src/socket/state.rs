//! Connection state machine.
//!
//! ```text
//! Disconnected --Connect--> Connecting --Opened--> Connected --Closed--> Closed
//! Connecting   --Failed---> Disconnected
//! Disconnected --Closed---> Closed
//! Closed       --Connect--> Connecting
//! ```

use serde::{Deserialize, Serialize};

use super::SocketError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Connect,
    Opened,
    Failed,
    Closed,
}

impl ConnectionState {
    /// Next state for `transition`, or `InvalidTransition`.
    pub fn on(self, transition: Transition) -> Result<Self, SocketError> {
        use ConnectionState as S;
        use Transition as T;

        match (self, transition) {
            (S::Disconnected | S::Closed, T::Connect) => Ok(S::Connecting),
            (S::Connecting, T::Opened) => Ok(S::Connected),
            (S::Connecting, T::Failed) => Ok(S::Disconnected),
            (S::Connected | S::Disconnected, T::Closed) => Ok(S::Closed),
            (from, transition) => Err(SocketError::InvalidTransition { from, transition }),
        }
    }

    /// No connection is live or pending.
    #[must_use]
    pub fn is_idle(self) -> bool {
        matches!(self, Self::Disconnected | Self::Closed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
        })
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
