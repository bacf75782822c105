//! Fuzz target for the incremental frame decoder
//!
//! # Strategy
//!
//! - Arbitrary byte streams: random framing, lengths, and payloads
//! - Arbitrary chunk boundaries: the same stream re-delivered in pieces,
//!   simulating partial network reads
//!
//! # Invariants
//!
//! - NEVER panic on any input
//! - Incomplete input consumes nothing from the buffer
//! - Chunk boundaries never change the decoded message sequence
//! - The first malformed frame ends decoding (connections are torn down,
//!   not resynchronized)

#![no_main]

use arbitrary::Arbitrary;
use bytes::{BufMut, BytesMut};
use libfuzzer_sys::fuzz_target;
use locksmith_proto::{decode_client, decode_server, ProtocolError, ServerMessage};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    /// Raw byte stream as it would arrive off the wire.
    stream: Vec<u8>,
    /// Read sizes used to re-deliver the stream in pieces.
    chunk_sizes: Vec<u8>,
}

type Decoded = Result<ServerMessage, ProtocolError>;

/// Drain the buffer; an error ends the stream like a closed connection.
fn drain(buf: &mut BytesMut, out: &mut Vec<Decoded>) -> bool {
    loop {
        let before = buf.len();
        match decode_server(buf) {
            Ok(Some(message)) => {
                assert!(buf.len() < before, "decode produced a frame without consuming bytes");
                out.push(Ok(message));
            },
            Ok(None) => {
                assert_eq!(buf.len(), before, "incomplete decode consumed bytes");
                return true;
            },
            Err(err) => {
                out.push(Err(err));
                return false;
            },
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    // Reference decode: the whole stream in one buffer.
    let mut whole = BytesMut::from(&input.stream[..]);
    let mut reference = Vec::new();
    drain(&mut whole, &mut reference);

    // The same stream delivered in arbitrary chunks must decode to the
    // same sequence.
    let mut buf = BytesMut::new();
    let mut chunked = Vec::new();
    let mut offset = 0;
    let mut sizes = input.chunk_sizes.iter().map(|&s| usize::from(s).max(1));

    while offset < input.stream.len() {
        let step = sizes.next().unwrap_or(input.stream.len()).min(input.stream.len() - offset);
        buf.put_slice(&input.stream[offset..offset + step]);
        offset += step;

        if !drain(&mut buf, &mut chunked) {
            break;
        }
    }

    assert_eq!(reference, chunked, "chunk boundaries changed the decoded sequence");

    // The server → client decoder shares the framing; it must be just as
    // panic-free.
    let mut client_buf = BytesMut::from(&input.stream[..]);
    while let Ok(Some(_)) = decode_client(&mut client_buf) {}
});
