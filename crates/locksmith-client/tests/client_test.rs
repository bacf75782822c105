//! Client behavior against a raw in-process listener.
//!
//! These tests stand in for the broker with a bare `TcpListener` so the
//! bytes the client puts on (and accepts from) the wire can be observed
//! directly.

use std::{sync::Arc, time::Duration};

use bytes::BytesMut;
use locksmith_client::{ClientOptions, GrantCallback, LockClient};
use locksmith_proto::{ClientMessage, ServerMessage, decode_server};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::mpsc,
    time::timeout,
};

const TICK: Duration = Duration::from_secs(1);
const SETTLE: Duration = Duration::from_millis(100);

async fn bind_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn options(port: u16, on_acquired: Option<GrantCallback>) -> ClientOptions {
    ClientOptions { host: "127.0.0.1".to_owned(), port, tls: None, on_acquired }
}

fn grant_channel() -> (GrantCallback, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: GrantCallback = Arc::new(move |tag: &str| {
        let _ = tx.send(tag.to_owned());
    });
    (callback, rx)
}

/// Read from `conn` until `count` client → server messages have decoded.
async fn read_requests(conn: &mut TcpStream, count: usize) -> Vec<ServerMessage> {
    let mut buf = BytesMut::new();
    let mut seen = Vec::new();

    while seen.len() < count {
        let n = timeout(TICK, conn.read_buf(&mut buf)).await.unwrap().unwrap();
        assert!(n > 0, "connection closed after {} of {count} messages", seen.len());

        while let Some(message) = decode_server(&mut buf).unwrap() {
            seen.push(message);
        }
    }
    seen
}

#[tokio::test]
async fn close_is_observed_as_eof() {
    let (listener, port) = bind_listener().await;
    let client = LockClient::connect(options(port, None)).await.unwrap();
    let (mut conn, _) = timeout(TICK, listener.accept()).await.unwrap().unwrap();

    client.close();

    let mut buf = [0u8; 16];
    let n = timeout(TICK, conn.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(n, 0, "expected EOF after client close");
}

#[tokio::test]
async fn acquire_and_release_reach_the_wire_in_order() {
    let (listener, port) = bind_listener().await;
    let client = LockClient::connect(options(port, None)).await.unwrap();
    let (mut conn, _) = timeout(TICK, listener.accept()).await.unwrap().unwrap();

    client.acquire("123").unwrap();
    client.release("123").unwrap();

    let seen = read_requests(&mut conn, 2).await;
    assert_eq!(
        seen,
        vec![
            ServerMessage::Acquire { tag: "123".to_owned() },
            ServerMessage::Release { tag: "123".to_owned() },
        ]
    );
}

#[tokio::test]
async fn grant_invokes_the_callback_with_the_tag() {
    let (listener, port) = bind_listener().await;
    let (callback, mut grants) = grant_channel();
    let client = LockClient::connect(options(port, Some(callback))).await.unwrap();
    let (mut conn, _) = timeout(TICK, listener.accept()).await.unwrap().unwrap();

    client.acquire("locktag").unwrap();
    let seen = read_requests(&mut conn, 1).await;
    assert_eq!(seen[0], ServerMessage::Acquire { tag: "locktag".to_owned() });

    let frame = ClientMessage::Acquired { tag: "locktag".to_owned() }.encode().unwrap();
    conn.write_all(&frame).await.unwrap();

    let granted = timeout(TICK, grants.recv()).await.unwrap().unwrap();
    assert_eq!(granted, "locktag");
}

#[tokio::test]
async fn split_frame_dispatches_exactly_once() {
    let (listener, port) = bind_listener().await;
    let (callback, mut grants) = grant_channel();
    let _client = LockClient::connect(options(port, Some(callback))).await.unwrap();
    let (mut conn, _) = timeout(TICK, listener.accept()).await.unwrap().unwrap();

    // First fragment: length + type + half the tag. No dispatch yet.
    conn.write_all(&[0, 3, 3, 3]).await.unwrap();
    tokio::time::sleep(SETTLE).await;
    assert!(grants.try_recv().is_err(), "dispatched on an incomplete frame");

    // Trailing byte completes the frame.
    conn.write_all(&[3]).await.unwrap();
    let granted = timeout(TICK, grants.recv()).await.unwrap().unwrap();
    assert_eq!(granted, "\u{3}\u{3}");

    tokio::time::sleep(SETTLE).await;
    assert!(grants.try_recv().is_err(), "frame dispatched twice");
}

#[tokio::test]
async fn batched_frames_all_dispatch() {
    let (listener, port) = bind_listener().await;
    let (callback, mut grants) = grant_channel();
    let _client = LockClient::connect(options(port, Some(callback))).await.unwrap();
    let (mut conn, _) = timeout(TICK, listener.accept()).await.unwrap().unwrap();

    let tags = ["a", "bb", "ccc"];
    let mut batch = Vec::new();
    for tag in tags {
        let frame = ClientMessage::Acquired { tag: tag.to_owned() }.encode().unwrap();
        batch.extend_from_slice(&frame);
    }
    conn.write_all(&batch).await.unwrap();

    for tag in tags {
        let granted = timeout(TICK, grants.recv()).await.unwrap().unwrap();
        assert_eq!(granted, tag);
    }
}

#[tokio::test]
async fn malformed_frame_stops_dispatch() {
    let (listener, port) = bind_listener().await;
    let (callback, mut grants) = grant_channel();
    let _client = LockClient::connect(options(port, Some(callback))).await.unwrap();
    let (mut conn, _) = timeout(TICK, listener.accept()).await.unwrap().unwrap();

    // Invalid UTF-8 tag, then a perfectly valid grant. The violation must
    // end dispatch before the valid frame is seen.
    conn.write_all(&[0, 3, 0x80, 0xBF, 0]).await.unwrap();
    let frame = ClientMessage::Acquired { tag: "late".to_owned() }.encode().unwrap();
    conn.write_all(&frame).await.unwrap();

    tokio::time::sleep(SETTLE).await;
    assert!(grants.try_recv().is_err(), "dispatch survived a protocol violation");
}

#[tokio::test]
async fn unknown_kind_is_a_protocol_violation() {
    let (listener, port) = bind_listener().await;
    let (callback, mut grants) = grant_channel();
    let _client = LockClient::connect(options(port, Some(callback))).await.unwrap();
    let (mut conn, _) = timeout(TICK, listener.accept()).await.unwrap().unwrap();

    // Kind 70 is not a server → client message; the lenient dispatch the
    // wire format might tempt is deliberately absent.
    conn.write_all(&[0, 3, 70, 70, 70]).await.unwrap();

    tokio::time::sleep(SETTLE).await;
    assert!(grants.try_recv().is_err(), "unknown kind was dispatched as a grant");
}

#[tokio::test]
async fn send_after_close_reports_closed() {
    let (listener, port) = bind_listener().await;
    let client = LockClient::connect(options(port, None)).await.unwrap();
    let _accepted = timeout(TICK, listener.accept()).await.unwrap().unwrap();

    client.close();
    tokio::time::sleep(SETTLE).await;

    assert!(client.acquire("x").is_err());
}
