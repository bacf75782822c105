//! Per-connection session actor.
//!
//! Each accepted connection gets a reader task (this module's `run`) and a
//! writer task. The reader accumulates raw bytes, drains every complete
//! frame after each read, and dispatches requests into the vault — waiting
//! on the vault's bounded mailbox when it is saturated, which is the
//! server's backpressure point. The writer drains the session's grant
//! channel independently, so a grant produced by any vault worker reaches
//! the peer without ever touching the read path.

use bytes::BytesMut;
use locksmith_core::{AcquireOutcome, LockSession, ReleaseOutcome, SessionId, Vault, VaultError};
use locksmith_proto::{ClientMessage, ProtocolError, ServerMessage, decode_server};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;

/// Why the read loop stopped dispatching.
enum SessionEnd {
    /// The peer sent a malformed frame; tear the connection down.
    Protocol(ProtocolError),
    /// The vault shut down underneath us.
    VaultClosed,
}

impl From<ProtocolError> for SessionEnd {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<VaultError> for SessionEnd {
    fn from(_: VaultError) -> Self {
        Self::VaultClosed
    }
}

/// Drive one connection until the peer goes away, a protocol violation
/// occurs, or the server shuts down. Always abandons the session's locks on
/// the way out.
pub(crate) async fn run<S>(stream: S, id: SessionId, vault: Vault, cancel: CancellationToken)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, writer) = tokio::io::split(stream);
    let (session, grants) = LockSession::new(id);
    let writer_task = tokio::spawn(write_grants(writer, grants, id));

    let mut buf = BytesMut::with_capacity(4096);
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!(session = id, "session cancelled");
                break;
            },
            read = reader.read_buf(&mut buf) => match read {
                Ok(0) => {
                    tracing::debug!(session = id, "peer closed connection");
                    break;
                },
                Ok(_) => match dispatch_buffered(&mut buf, &session, &vault).await {
                    Ok(()) => {},
                    Err(SessionEnd::Protocol(err)) => {
                        tracing::warn!(session = id, %err, "protocol violation, closing connection");
                        break;
                    },
                    Err(SessionEnd::VaultClosed) => break,
                },
                Err(err) => {
                    tracing::debug!(session = id, %err, "read failed");
                    break;
                },
            },
        }
    }

    vault.abandon(id).await;
    writer_task.abort();
    tracing::debug!(session = id, "session closed");
}

/// Drain every complete frame currently buffered and dispatch it.
async fn dispatch_buffered(
    buf: &mut BytesMut,
    session: &LockSession,
    vault: &Vault,
) -> Result<(), SessionEnd> {
    while let Some(message) = decode_server(buf)? {
        match message {
            ServerMessage::Acquire { tag } => {
                match vault.acquire(tag.clone(), session.clone()).await? {
                    AcquireOutcome::Granted | AcquireOutcome::Enqueued => {},
                    AcquireOutcome::Rejected => {
                        // Recoverable refusal; the peer simply never gets a
                        // grant for this attempt.
                        tracing::warn!(session = session.id(), %tag, "acquire rejected, queue full");
                    },
                }
            },
            ServerMessage::Release { tag } => {
                if vault.release(tag.clone(), session.id()).await? == ReleaseOutcome::NotHolder {
                    tracing::warn!(session = session.id(), %tag, "release from non-holder ignored");
                }
            },
        }
    }
    Ok(())
}

/// Writer half: turn grants into `Acquired` frames on the wire.
async fn write_grants<W>(mut writer: W, mut grants: mpsc::UnboundedReceiver<String>, id: SessionId)
where
    W: AsyncWrite + Unpin,
{
    while let Some(tag) = grants.recv().await {
        // A tag that decoded off the wire always re-encodes.
        let Ok(frame) = ClientMessage::Acquired { tag }.encode() else {
            continue;
        };

        if let Err(err) = write_frame(&mut writer, &frame).await {
            tracing::debug!(session = id, %err, "grant write failed");
            break;
        }
    }
}

async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await
}
