//! TLS termination for the internal (mTLS) API.
//!
//! Client certificate verification is mandatory here: a connection that
//! doesn't present a certificate signed by `ca_cert_file` is rejected at
//! the handshake, before any request reaches a handler. This is what
//! makes the internal API's "mTLS-only" contract real rather than a
//! deployment convention.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};

use crate::config::ServiceConfig;
use crate::error::ServiceError;

/// Builds the rustls server configuration for the internal listener:
/// server identity from `server_cert_file`/`server_key_file`, client
/// certificates verified against `ca_cert_file`.
///
/// # Errors
///
/// Returns an error if any of the three files can't be read or parsed,
/// or if the CA bundle is empty.
pub fn server_config(config: &ServiceConfig) -> Result<ServerConfig, ServiceError> {
    let server_certs = load_certs(&config.server_cert_file)?;
    let server_key = load_key(&config.server_key_file)?;

    let mut roots = RootCertStore::empty();
    for cert in load_certs(&config.ca_cert_file)? {
        roots
            .add(cert)
            .map_err(|e| ServiceError::Tls(format!("invalid CA certificate: {e}")))?;
    }
    let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
        .build()
        .map_err(|e| ServiceError::Tls(format!("building client verifier: {e}")))?;

    ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(server_certs, server_key)
        .map_err(|e| ServiceError::Tls(format!("invalid server certificate/key: {e}")))
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, ServiceError> {
    let file = File::open(path).map_err(|e| ServiceError::Tls(format!("{path}: {e}")))?;
    rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServiceError::Tls(format!("{path}: {e}")))
}

fn load_key(path: &str) -> Result<PrivateKeyDer<'static>, ServiceError> {
    let file = File::open(path).map_err(|e| ServiceError::Tls(format!("{path}: {e}")))?;
    let mut keys = rustls_pemfile::pkcs8_private_keys(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServiceError::Tls(format!("{path}: {e}")))?;
    let key = keys
        .pop()
        .ok_or_else(|| ServiceError::Tls(format!("{path}: no PKCS#8 private key found")))?;
    Ok(PrivateKeyDer::Pkcs8(key))
}
