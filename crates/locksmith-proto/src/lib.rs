//! Wire format for the Locksmith protocol.
//!
//! Frames consist of a 2-byte big-endian length prefix followed by a
//! variable-length payload: one type byte and the UTF-8 bytes of the lock
//! tag. The length prefix counts everything after itself, so a frame
//! carrying tag `t` occupies `2 + 1 + t.len()` bytes and a tag can be at
//! most 65534 bytes long.
//!
//! ```text
//! +----------------+-----------+--------------------+
//! | length (u16be) | type (u8) | tag (UTF-8, L - 1) |
//! +----------------+-----------+--------------------+
//! ```
//!
//! The same framing is used in both directions, with one type enumeration
//! per direction: [`ServerMessage`] travels client → server and
//! [`ClientMessage`] travels server → client.
//!
//! Decoding is incremental: [`decode_server`] and [`decode_client`] operate
//! on a caller-owned accumulation buffer and consume nothing until a whole
//! frame is available, so callers can feed raw reads straight in and drain
//! complete frames in a loop. A frame that fails validation is consumed and
//! reported as a [`ProtocolError`]; the connection it arrived on should be
//! torn down rather than resynchronized.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod errors;
pub mod message;

pub use codec::{MAX_TAG_LEN, decode_client, decode_server};
pub use errors::{ProtocolError, Result};
pub use message::{ClientMessage, ServerMessage};
