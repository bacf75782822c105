//! The lock client: one connection, fire-and-forget requests, async grants.
//!
//! The connection is split into a reader task and a writer task, mirroring
//! the broker's session layout. `acquire`/`release` hand pre-encoded frames
//! to the writer; the reader runs the incremental decode loop and invokes
//! the grant callback for every `Acquired` frame. Any protocol violation
//! from the broker ends the reader — the framing has no resync point.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use locksmith_proto::{ClientMessage, ServerMessage, decode_client};
use rustls::pki_types::ServerName;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    sync::mpsc,
    task::JoinHandle,
};

use crate::{
    error::ClientError,
    tls::{self, TlsOptions},
};

/// Invoked once per granted lock, with the tag, on the client's dispatch
/// task. Long-running work belongs elsewhere: while the callback runs, no
/// further grants are dispatched.
pub type GrantCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Connection options.
#[derive(Clone)]
pub struct ClientOptions {
    /// Broker hostname. Doubles as the TLS server name.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// TLS material; `None` connects over plaintext TCP.
    pub tls: Option<TlsOptions>,
    /// Grant callback. A client without one can still acquire locks, it
    /// just never learns when it wins them.
    pub on_acquired: Option<GrantCallback>,
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("on_acquired", &self.on_acquired.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

/// A connection to the broker.
///
/// Dropping the client closes the connection; the broker then releases
/// everything this session held or waited for.
#[derive(Debug)]
pub struct LockClient {
    frames: mpsc::UnboundedSender<Bytes>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl LockClient {
    /// Connect to the broker, plaintext or TLS according to the options.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, the TLS material, or the
    /// handshake fails. There is no retry.
    pub async fn connect(options: ClientOptions) -> Result<Self, ClientError> {
        let stream = TcpStream::connect((options.host.as_str(), options.port)).await?;

        match &options.tls {
            Some(tls_options) => {
                let connector = tls::connector(tls_options)?;
                let name = ServerName::try_from(options.host.clone())
                    .map_err(|e| ClientError::Tls(format!("invalid server name: {e}")))?;
                let stream = connector.connect(name, stream).await?;
                Ok(Self::spawn(stream, options.on_acquired))
            },
            None => Ok(Self::spawn(stream, options.on_acquired)),
        }
    }

    fn spawn<S>(stream: S, on_acquired: Option<GrantCallback>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (frames, frame_rx) = mpsc::unbounded_channel();

        let writer = tokio::spawn(write_loop(write_half, frame_rx));
        let writer_abort = writer.abort_handle();
        let reader = tokio::spawn(async move {
            read_loop(read_half, on_acquired).await;
            // The framing has no resync point; whatever ended the read
            // loop ends the connection.
            writer_abort.abort();
        });

        Self { frames, reader, writer }
    }

    /// Request the lock named `tag`. Fire-and-forget: a grant, if and when
    /// the broker awards one, arrives through the callback.
    pub fn acquire(&self, tag: &str) -> Result<(), ClientError> {
        self.send(&ServerMessage::Acquire { tag: tag.to_owned() })
    }

    /// Give the lock named `tag` back. Fire-and-forget; a release of a tag
    /// this session does not hold is ignored by the broker.
    pub fn release(&self, tag: &str) -> Result<(), ClientError> {
        self.send(&ServerMessage::Release { tag: tag.to_owned() })
    }

    fn send(&self, message: &ServerMessage) -> Result<(), ClientError> {
        let frame = message.encode()?;
        self.frames.send(frame).map_err(|_| ClientError::Closed)
    }

    /// Tear the connection down. Idempotent; also runs on drop.
    pub fn close(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

impl Drop for LockClient {
    fn drop(&mut self) {
        self.close();
    }
}

async fn read_loop<R>(mut reader: R, on_acquired: Option<GrantCallback>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        match reader.read_buf(&mut buf).await {
            Ok(0) => {
                tracing::debug!("broker closed connection");
                return;
            },
            Ok(_) => loop {
                match decode_client(&mut buf) {
                    Ok(Some(ClientMessage::Acquired { tag })) => {
                        tracing::debug!(%tag, "lock granted");
                        if let Some(callback) = &on_acquired {
                            callback(&tag);
                        }
                    },
                    Ok(Some(ClientMessage::Released { tag })) => {
                        // Reserved notification; nothing to do yet.
                        tracing::debug!(%tag, "release notification ignored");
                    },
                    Ok(None) => break,
                    Err(err) => {
                        tracing::error!(%err, "protocol violation from broker, disconnecting");
                        return;
                    },
                }
            },
            Err(err) => {
                tracing::debug!(%err, "read failed");
                return;
            },
        }
    }
}

async fn write_loop<W>(mut writer: W, mut frames: mpsc::UnboundedReceiver<Bytes>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        let write = async {
            writer.write_all(&frame).await?;
            writer.flush().await
        };

        if let Err(err) = write.await {
            tracing::debug!(%err, "write failed, closing connection");
            return;
        }
    }
}
