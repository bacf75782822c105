//! Server error types.

use thiserror::Error;

/// Fatal server errors.
///
/// Everything here prevents or ends serving. Per-connection failures
/// (handshakes, resets, protocol violations) never surface this type; they
/// are logged and contained to the connection they happened on.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// TLS material could not be loaded or is unusable.
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// Listener I/O failure.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}
