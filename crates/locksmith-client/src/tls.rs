//! TLS configuration for the client connection.
//!
//! The client always floors at TLS 1.3 when TLS is configured, matching
//! what the broker requires for mutual authentication.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};

use rustls::{
    ClientConfig, RootCertStore,
    pki_types::{CertificateDer, PrivateKeyDer},
};
use tokio_rustls::TlsConnector;

use crate::error::ClientError;

/// Paths to the PEM material for a TLS connection.
#[derive(Debug, Clone)]
pub struct TlsOptions {
    /// CA bundle trusted to sign the server certificate.
    pub ca_path: PathBuf,
    /// Client certificate presented to the server, for mutual
    /// authentication.
    pub identity: Option<TlsIdentity>,
}

/// A client certificate and its private key.
#[derive(Debug, Clone)]
pub struct TlsIdentity {
    /// Client certificate chain (PEM).
    pub cert_path: PathBuf,
    /// Client private key (PEM).
    pub key_path: PathBuf,
}

pub(crate) fn connector(options: &TlsOptions) -> Result<TlsConnector, ClientError> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(&options.ca_path)? {
        roots.add(cert).map_err(|e| ClientError::Tls(e.to_string()))?;
    }

    let builder = ClientConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
        .with_root_certificates(roots);

    let config = match &options.identity {
        Some(identity) => builder
            .with_client_auth_cert(load_certs(&identity.cert_path)?, load_key(&identity.key_path)?)
            .map_err(|e| ClientError::Tls(e.to_string()))?,
        None => builder.with_no_client_auth(),
    };

    Ok(TlsConnector::from(Arc::new(config)))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ClientError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ClientError::Tls(format!("{}: {e}", path.display())))?;

    if certs.is_empty() {
        return Err(ClientError::Tls(format!("no certificates in {}", path.display())));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, ClientError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| ClientError::Tls(format!("{}: {e}", path.display())))?
        .ok_or_else(|| ClientError::Tls(format!("no private key in {}", path.display())))
}

fn open(path: &Path) -> Result<BufReader<File>, ClientError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| ClientError::Tls(format!("{}: {e}", path.display())))
}
