//! Locksmith production server.
//!
//! Accepts TCP (optionally mutually-TLS-authenticated) connections and
//! brokers named locks between them through the vault.
//!
//! ## Architecture
//!
//! ```text
//! locksmith-server
//!   ├─ Server           (listener + accept loop, cancellable)
//!   ├─ TlsSettings      (PEM material, loaded fatally at bind)
//!   ├─ Session          (per-connection reader + writer tasks)
//!   └─ Vault            (locksmith-core worker pool)
//! ```
//!
//! Sessions talk to the vault exclusively through its acquire / release /
//! abandon contract; no connection ever touches lock state directly, and no
//! failure of one connection can corrupt another's view of the locks.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod session;
mod tls;

use std::net::SocketAddr;

use locksmith_core::{SessionId, Vault, VaultConfig};
use tokio::{net::TcpListener, task::JoinSet};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

pub use error::ServerError;
pub use tls::TlsSettings;

/// Server configuration, supplied by the host process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (e.g. "0.0.0.0:9000").
    pub bind_address: String,
    /// Vault tuning (worker count, queue capacity, discipline).
    pub vault: VaultConfig,
    /// TLS material; `None` serves plaintext TCP.
    pub tls: Option<TlsSettings>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:9000".to_owned(), vault: VaultConfig::default(), tls: None }
    }
}

/// The listening broker.
pub struct Server {
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    vault_config: VaultConfig,
}

impl Server {
    /// Bind the listener and load TLS material.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails or any configured TLS material is
    /// missing or unusable; nothing is served in that case.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let acceptor = config.tls.as_ref().map(tls::acceptor).transpose()?;
        let listener = TcpListener::bind(&config.bind_address).await?;

        Ok(Self { listener, acceptor, vault_config: config.vault })
    }

    /// The local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `cancel` fires.
    ///
    /// On cancellation the listener stops accepting, every session is told
    /// to stop, and `run` returns once they have all abandoned their locks
    /// and exited.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ServerError> {
        tracing::info!(
            addr = %self.local_addr()?,
            tls = self.acceptor.is_some(),
            "locksmith serving"
        );

        let vault = Vault::new(self.vault_config);
        let mut sessions = JoinSet::new();
        let mut next_id: SessionId = 0;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        next_id += 1;
                        let id = next_id;
                        tracing::debug!(session = id, %peer, "connection accepted");

                        let vault = vault.clone();
                        let cancel = cancel.child_token();
                        match self.acceptor.clone() {
                            Some(acceptor) => {
                                sessions.spawn(async move {
                                    match acceptor.accept(stream).await {
                                        Ok(stream) => {
                                            session::run(stream, id, vault, cancel).await;
                                        },
                                        Err(err) => {
                                            tracing::warn!(
                                                session = id, %peer, %err,
                                                "TLS handshake failed"
                                            );
                                        },
                                    }
                                });
                            },
                            None => {
                                sessions.spawn(session::run(stream, id, vault, cancel));
                            },
                        }
                    },
                    Err(err) => tracing::error!(%err, "accept failed"),
                },
                // Reap finished sessions so the set does not grow with
                // connection churn.
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {},
            }
        }

        tracing::info!(sessions = sessions.len(), "shutting down, draining sessions");
        while sessions.join_next().await.is_some() {}

        Ok(())
    }
}
