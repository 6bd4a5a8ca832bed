//! Client error types.

use protocol::ProtocolError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors surfaced by a [`Session`](crate::Session).
///
/// A read timeout is not an error; `tick` reports it as `Ok(false)`.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The message could not be decoded. Fatal to that message only.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The server closed the connection or the session was closed locally.
    #[error("Connection closed")]
    Closed,

    /// Underlying WebSocket failure.
    #[error("Transport error: {0}")]
    Transport(#[from] tungstenite::Error),
}

impl SessionError {
    /// True when the session can no longer be used and the caller has to
    /// reconnect through the directory.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SessionError::Protocol(_))
    }
}

/// Errors from the region directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Directory kept returning unusable address {address} ({attempts} attempts)")]
    DegenerateAddress { address: String, attempts: u32 },

    #[error("Invalid server address: {0:?}")]
    InvalidAddress(String),

    #[error("Unknown region: {0}")]
    UnknownRegion(String),
}
