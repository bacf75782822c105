//! Locksmith server binary.
//!
//! # Usage
//!
//! ```bash
//! # Plaintext on the default port
//! locksmith-server --bind 0.0.0.0:9000
//!
//! # Mutually-authenticated TLS
//! locksmith-server --tls --tls-cert cert.pem --tls-key key.pem \
//!     --tls-client-ca clients.pem
//! ```

use std::path::PathBuf;

use clap::Parser;
use locksmith_core::{QueueDiscipline, VaultConfig};
use locksmith_server::{Server, ServerConfig, ServerError, TlsSettings};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Locksmith mutual-exclusion broker
#[derive(Parser, Debug)]
#[command(name = "locksmith-server")]
#[command(about = "Network broker for named exclusive locks")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:9000")]
    bind: String,

    /// Wait-queue discipline
    #[arg(long, default_value = "fifo")]
    queue_discipline: QueueDiscipline,

    /// Vault worker tasks
    #[arg(long, default_value_t = 10)]
    concurrency: usize,

    /// Waiters admitted per tag before acquires are refused
    #[arg(long, default_value_t = 50)]
    capacity: usize,

    /// Serve TLS (requires --tls-cert and --tls-key)
    #[arg(long)]
    tls: bool,

    /// Server certificate chain (PEM)
    #[arg(long)]
    tls_cert: Option<PathBuf>,

    /// Server private key (PEM)
    #[arg(long)]
    tls_key: Option<PathBuf>,

    /// Require client certificates signed by this CA bundle (PEM)
    #[arg(long)]
    tls_client_ca: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn tls_settings(&self) -> Result<Option<TlsSettings>, ServerError> {
        if !self.tls {
            return Ok(None);
        }

        match (&self.tls_cert, &self.tls_key) {
            (Some(cert_path), Some(key_path)) => Ok(Some(TlsSettings {
                cert_path: cert_path.clone(),
                key_path: key_path.clone(),
                client_ca_path: self.tls_client_ca.clone(),
            })),
            _ => Err(ServerError::Config(
                "--tls requires both --tls-cert and --tls-key".to_owned(),
            )),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("locksmith starting");

    let config = ServerConfig {
        bind_address: args.bind.clone(),
        vault: VaultConfig {
            concurrency: args.concurrency,
            queue_capacity: args.capacity,
            discipline: args.queue_discipline,
            ..VaultConfig::default()
        },
        tls: args.tls_settings()?,
    };

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received");
        signal_cancel.cancel();
    });

    let server = Server::bind(config).await?;
    server.run(cancel).await?;

    tracing::info!("server stopped");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let Ok(mut sigterm) = signal(SignalKind::terminate()) else {
        let _ = tokio::signal::ctrl_c().await;
        return;
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigterm.recv() => {},
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
