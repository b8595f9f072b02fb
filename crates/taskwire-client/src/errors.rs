//! Client error types.

use thiserror::Error;

/// Errors surfaced by the gateway client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The WebSocket transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// An operation needed an open connection and there wasn't one.
    #[error("not connected")]
    NotConnected,

    /// The configured gateway URL could not be parsed.
    #[error("invalid gateway url: {0}")]
    InvalidUrl(String),

    /// Credential store I/O failed.
    #[error("credential store error: {0}")]
    Credentials(#[from] std::io::Error),
}
