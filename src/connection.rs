//! IMAP connection and TLS helpers
//!
//! Opens an authenticated session over implicit TLS or STARTTLS. Both
//! paths end in the same [`ImapSession`] type.

use crate::config::{ImapConfig, Security};
use crate::error::{Error, Result};
use async_imap::Session;
use rustls::pki_types::ServerName;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, info};

/// A TLS-wrapped IMAP session.
pub type ImapSession = Session<Compat<TlsStream<TcpStream>>>;

/// Build the TLS connector for `config`.
///
/// Certificates are checked against the bundled web PKI roots unless
/// `accept_invalid_certs` is set, in which case every certificate is
/// accepted (local bridges with self-signed certificates).
fn tls_connector(config: &ImapConfig) -> TlsConnector {
    let builder = rustls::ClientConfig::builder();
    let tls = if config.accept_invalid_certs {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(DangerousVerifier))
            .with_no_client_auth()
    } else {
        let roots = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        builder.with_root_certificates(roots).with_no_client_auth()
    };
    TlsConnector::from(Arc::new(tls))
}

/// Open a fresh, logged-in IMAP session.
///
/// # Errors
///
/// Returns [`Error::Io`] if the TCP connection fails, [`Error::Tls`] if
/// STARTTLS or the handshake fails, and [`Error::Imap`] if login is
/// rejected.
pub async fn connect(config: &ImapConfig) -> Result<ImapSession> {
    let addr = format!("{}:{}", config.host, config.port);
    debug!(%addr, security = ?config.security, "Connecting to IMAP server");

    let mut tcp_stream = TcpStream::connect(&addr).await?;

    if config.security == Security::StartTls {
        let mut client = async_imap::Client::new(tcp_stream.compat());
        client
            .run_command_and_check_ok("STARTTLS", None)
            .await
            .map_err(|e| Error::Tls(format!("STARTTLS failed: {e}")))?;
        tcp_stream = client.into_inner().into_inner();
    }

    let server_name = ServerName::try_from(config.host.clone())
        .map_err(|e| Error::Tls(format!("Invalid server name: {e}")))?;
    let tls_stream = tls_connector(config)
        .connect(server_name, tcp_stream)
        .await
        .map_err(|e| Error::Tls(e.to_string()))?;

    let session = async_imap::Client::new(tls_stream.compat())
        .login(&config.username, &config.password)
        .await
        .map_err(|(e, _)| Error::Imap(format!("Login failed: {e}")))?;

    info!(host = %config.host, "Connected to IMAP server");
    Ok(session)
}

/// SELECT a folder on an existing session.
///
/// # Errors
///
/// Returns [`Error::Imap`] if the server rejects the SELECT.
pub async fn select(session: &mut ImapSession, folder: &str) -> Result<()> {
    session
        .select(folder)
        .await
        .map_err(|e| Error::Imap(format!("Failed to select {folder}: {e}")))?;
    Ok(())
}

/// Certificate verifier that accepts all certificates.
#[derive(Debug)]
struct DangerousVerifier;

impl rustls::client::danger::ServerCertVerifier for DangerousVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
