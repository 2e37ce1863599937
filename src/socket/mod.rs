//! WebSocket transport wrapper.
//!
//! DESIGN
//! ======
//! `WebSocketClient` exposes callback registration (`on_open`, `on_close`,
//! `on_message`, `on_error`) over a tokio-tungstenite connection. Unlike a
//! bare host socket it tracks an explicit `ConnectionState` and reports every
//! transport failure to `on_error` observers as well as the log.
//!
//! `on_message` receives the payload only, never the transport frame.

mod client;
mod state;

use std::time::Duration;

use tokio_tungstenite::tungstenite;

pub use client::WebSocketClient;
pub use state::{ConnectionState, Transition};

// =============================================================================
// PAYLOAD
// =============================================================================

/// Raw body of one data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    fn into_message(self) -> tungstenite::Message {
        match self {
            Self::Text(text) => tungstenite::Message::Text(text.into()),
            Self::Binary(bytes) => tungstenite::Message::Binary(bytes.into()),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

/// How a connection ended. `code` is absent when the peer sent no close frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: Option<u16>,
    pub reason: String,
}

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("websocket connect failed: {0}")]
    Connect(Box<tungstenite::Error>),

    #[error("websocket connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("websocket transport error: {0}")]
    Transport(Box<tungstenite::Error>),

    #[error("websocket not connected (state: {0})")]
    NotConnected(ConnectionState),

    /// A local close is waiting on the peer's reply; no more sends.
    #[error("websocket closing")]
    Closing,

    #[error("invalid connection transition {transition:?} from {from}")]
    InvalidTransition { from: ConnectionState, transition: Transition },
}

impl SocketError {
    /// Grepable code for logs and error events.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Connect(_) => "E_WS_CONNECT",
            Self::ConnectTimeout(_) => "E_WS_CONNECT_TIMEOUT",
            Self::Transport(_) => "E_WS_TRANSPORT",
            Self::NotConnected(_) => "E_WS_NOT_CONNECTED",
            Self::Closing => "E_WS_CLOSING",
            Self::InvalidTransition { .. } => "E_WS_INVALID_TRANSITION",
        }
    }

    /// Whether a fresh connection attempt could succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::ConnectTimeout(_) | Self::Transport(_))
    }
}
