//! Protocol error types.

use thiserror::Error;

/// Errors from frame encoding and decoding.
///
/// Decode errors are terminal for the connection they occurred on: the
/// framing discipline has no resynchronization point, so the peer is
/// disconnected instead. [`ProtocolError::PayloadTooLarge`] is the only
/// variant an encoder can produce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Tag does not fit the 16-bit length prefix.
    #[error("tag too large for frame: {len} bytes, limit is {limit}")]
    PayloadTooLarge {
        /// Byte length of the offending tag.
        len: usize,
        /// Maximum encodable tag length.
        limit: usize,
    },

    /// Length prefix declares an empty payload, which cannot carry a type
    /// byte.
    #[error("frame has empty payload")]
    EmptyFrame,

    /// Tag bytes are not well-formed UTF-8.
    #[error("tag is not valid UTF-8")]
    InvalidEncoding,

    /// Type byte is not a known message kind for this direction.
    #[error("unknown message kind {kind:#04x}")]
    UnknownKind {
        /// The unrecognized type byte.
        kind: u8,
    },
}

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
