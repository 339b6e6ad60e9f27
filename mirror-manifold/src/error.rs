//! Error types for the streaming session

use std::time::Duration;

use thiserror::Error;

/// Errors reported by a transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The peer closed the connection or it was closed locally
    #[error("connection closed")]
    Closed,

    /// The connection could not be established or broke
    #[error("connection error: {0}")]
    Connection(String),

    /// A single frame could not be read; the connection is still usable
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Whether the session must reconnect after this error
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, Self::Closed | Self::Connection(_))
    }
}

/// Errors that end a session attempt
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("No response received within {0:?} after subscribing")]
    AckTimeout(Duration),

    #[error("Failed to reconnect after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}
