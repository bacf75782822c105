//! Message types for both protocol directions.
//!
//! The two directions use independent type enumerations drawn from a shared
//! byte space: `0x01`/`0x02` flow client → server, `0x03`/`0x04` flow
//! server → client. A type byte is only meaningful for the direction it was
//! read from.

use bytes::Bytes;

use crate::{Result, codec};

/// Wire type byte for [`ServerMessage::Acquire`].
pub(crate) const KIND_ACQUIRE: u8 = 0x01;
/// Wire type byte for [`ServerMessage::Release`].
pub(crate) const KIND_RELEASE: u8 = 0x02;
/// Wire type byte for [`ClientMessage::Acquired`].
pub(crate) const KIND_ACQUIRED: u8 = 0x03;
/// Wire type byte for [`ClientMessage::Released`].
pub(crate) const KIND_RELEASED: u8 = 0x04;

/// Requests sent by a client to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Request exclusive ownership of a tag.
    Acquire {
        /// Tag naming the lock.
        tag: String,
    },

    /// Give up ownership of a tag.
    Release {
        /// Tag naming the lock.
        tag: String,
    },
}

impl ServerMessage {
    /// Encode this message as one wire frame.
    pub fn encode(&self) -> Result<Bytes> {
        match self {
            Self::Acquire { tag } => codec::encode_frame(KIND_ACQUIRE, tag),
            Self::Release { tag } => codec::encode_frame(KIND_RELEASE, tag),
        }
    }

    /// The tag this message operates on.
    pub fn tag(&self) -> &str {
        match self {
            Self::Acquire { tag } | Self::Release { tag } => tag,
        }
    }
}

/// Notifications sent by the broker to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// The client now holds the lock for this tag.
    Acquired {
        /// Tag naming the lock.
        tag: String,
    },

    /// Reserved for forced-release notifications. Decoded for forward
    /// compatibility; the current broker never sends it.
    Released {
        /// Tag naming the lock.
        tag: String,
    },
}

impl ClientMessage {
    /// Encode this message as one wire frame.
    pub fn encode(&self) -> Result<Bytes> {
        match self {
            Self::Acquired { tag } => codec::encode_frame(KIND_ACQUIRED, tag),
            Self::Released { tag } => codec::encode_frame(KIND_RELEASED, tag),
        }
    }

    /// The tag this message refers to.
    pub fn tag(&self) -> &str {
        match self {
            Self::Acquired { tag } | Self::Released { tag } => tag,
        }
    }
}
