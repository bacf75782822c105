//! Client error types.

use locksmith_proto::ProtocolError;
use thiserror::Error;

/// Errors from client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection or socket failure.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS material, server name, or handshake configuration failure.
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// A frame could not be built (tag too large).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The connection has been closed; the client is no longer usable.
    #[error("connection closed")]
    Closed,
}
