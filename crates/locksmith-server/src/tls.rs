//! TLS material loading for the listener.
//!
//! All PEM material is read once at bind time; anything unreadable is a
//! fatal startup error, the server never begins serving with broken TLS.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};

use rustls::{
    RootCertStore,
    pki_types::{CertificateDer, PrivateKeyDer},
    server::WebPkiClientVerifier,
};
use tokio_rustls::TlsAcceptor;

use crate::error::ServerError;

/// Paths to the PEM material the listener needs.
#[derive(Debug, Clone)]
pub struct TlsSettings {
    /// Server certificate chain.
    pub cert_path: PathBuf,
    /// Server private key.
    pub key_path: PathBuf,
    /// CA bundle for client certificates. When set, mutual authentication
    /// is required and the handshake floor is TLS 1.3.
    pub client_ca_path: Option<PathBuf>,
}

/// Build the acceptor from the configured material.
pub(crate) fn acceptor(settings: &TlsSettings) -> Result<TlsAcceptor, ServerError> {
    let certs = load_certs(&settings.cert_path)?;
    let key = load_key(&settings.key_path)?;

    let builder = match &settings.client_ca_path {
        Some(ca_path) => {
            let mut roots = RootCertStore::empty();
            for cert in load_certs(ca_path)? {
                roots.add(cert).map_err(|e| ServerError::Tls(e.to_string()))?;
            }
            let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
                .build()
                .map_err(|e| ServerError::Tls(e.to_string()))?;

            rustls::ServerConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
                .with_client_cert_verifier(verifier)
        },
        None => rustls::ServerConfig::builder().with_no_client_auth(),
    };

    let config =
        builder.with_single_cert(certs, key).map_err(|e| ServerError::Tls(e.to_string()))?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ServerError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Tls(format!("{}: {e}", path.display())))?;

    if certs.is_empty() {
        return Err(ServerError::Tls(format!("no certificates in {}", path.display())));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, ServerError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| ServerError::Tls(format!("{}: {e}", path.display())))?
        .ok_or_else(|| ServerError::Tls(format!("no private key in {}", path.display())))
}

fn open(path: &Path) -> Result<BufReader<File>, ServerError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| ServerError::Tls(format!("{}: {e}", path.display())))
}
