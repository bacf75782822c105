//! Incremental frame encoding and decoding.
//!
//! The decoder works over a caller-owned [`BytesMut`] that accumulates raw
//! transport reads. Each call either consumes exactly one whole frame or
//! consumes nothing and reports that more data is needed (`Ok(None)`), so a
//! half-delivered frame survives across reads untouched. Multiple frames can
//! arrive in one read; callers must drain in a loop until `Ok(None)`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    ClientMessage, ProtocolError, Result, ServerMessage,
    message::{KIND_ACQUIRE, KIND_ACQUIRED, KIND_RELEASE, KIND_RELEASED},
};

/// Maximum encodable tag length in bytes.
///
/// The length prefix is 16 bits and counts the type byte, leaving
/// `u16::MAX - 1` bytes for the tag itself.
pub const MAX_TAG_LEN: usize = u16::MAX as usize - 1;

/// Size of the length prefix.
const LEN_PREFIX: usize = 2;

/// Build one frame: length prefix, type byte, tag bytes.
pub(crate) fn encode_frame(kind: u8, tag: &str) -> Result<Bytes> {
    if tag.len() > MAX_TAG_LEN {
        return Err(ProtocolError::PayloadTooLarge { len: tag.len(), limit: MAX_TAG_LEN });
    }

    let payload_len = tag.len() + 1;
    let mut buf = BytesMut::with_capacity(LEN_PREFIX + payload_len);
    buf.put_u16(payload_len as u16);
    buf.put_u8(kind);
    buf.put_slice(tag.as_bytes());
    Ok(buf.freeze())
}

/// Try to take one whole frame off the front of `buf`.
///
/// Returns `Ok(None)` without consuming anything while the buffer holds less
/// than a complete frame. On success the frame's bytes are consumed and the
/// raw `(kind, tag)` pair is returned. On failure the frame's bytes are
/// still consumed; there is no recovery point in the stream after a
/// malformed frame.
fn decode_frame(buf: &mut BytesMut) -> Result<Option<(u8, String)>> {
    if buf.len() < LEN_PREFIX {
        return Ok(None);
    }

    let payload_len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    if buf.len() < LEN_PREFIX + payload_len {
        return Ok(None);
    }

    buf.advance(LEN_PREFIX);
    let payload = buf.split_to(payload_len);

    let Some((&kind, tag_bytes)) = payload.split_first() else {
        return Err(ProtocolError::EmptyFrame);
    };

    // UTF-8 validation happens before the kind byte is interpreted, so a
    // frame that is malformed in both ways reports the encoding error.
    let tag =
        std::str::from_utf8(tag_bytes).map_err(|_| ProtocolError::InvalidEncoding)?.to_owned();

    Ok(Some((kind, tag)))
}

/// Decode one client → server message, if a whole frame is buffered.
pub fn decode_server(buf: &mut BytesMut) -> Result<Option<ServerMessage>> {
    let Some((kind, tag)) = decode_frame(buf)? else {
        return Ok(None);
    };

    match kind {
        KIND_ACQUIRE => Ok(Some(ServerMessage::Acquire { tag })),
        KIND_RELEASE => Ok(Some(ServerMessage::Release { tag })),
        kind => Err(ProtocolError::UnknownKind { kind }),
    }
}

/// Decode one server → client message, if a whole frame is buffered.
pub fn decode_client(buf: &mut BytesMut) -> Result<Option<ClientMessage>> {
    let Some((kind, tag)) = decode_frame(buf)? else {
        return Ok(None);
    };

    match kind {
        KIND_ACQUIRED => Ok(Some(ClientMessage::Acquired { tag })),
        KIND_RELEASED => Ok(Some(ClientMessage::Released { tag })),
        kind => Err(ProtocolError::UnknownKind { kind }),
    }
}
