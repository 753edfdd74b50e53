// src/core/scanner/ssl_scanner.rs

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, SignatureScheme};
use serde_json::Value;
use tokio::task::spawn_blocking;
use tracing::{debug, error, info, warn};
use x509_parser::prelude::*;

use super::{to_value, Probe, ProbeTarget};
use crate::core::models::{CertificateSummary, Stage, TlsInspection};
use crate::core::results::ScanResults;
use crate::error::ProbeError;

const TLS_PORT: u16 = 443;

/// Accepts any certificate chain so that expired, self-signed or mismatched
/// certificates can still be described. Handshake signatures are still checked.
#[derive(Debug)]
struct InspectOnlyVerifier(Arc<CryptoProvider>);

impl ServerCertVerifier for InspectOnlyVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

pub struct SslProbe {
    timeout: Duration,
}

impl SslProbe {
    /// `timeout` bounds the TCP connect and every socket read/write of the handshake.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Probe for SslProbe {
    fn stage(&self) -> Stage {
        Stage::SslTls
    }

    async fn run(&self, target: &ProbeTarget, _results: &ScanResults) -> Result<Value, ProbeError> {
        let inspection = inspect_tls(&target.domain, self.timeout).await?;
        to_value(&inspection)
    }
}

/// Connects to `domain:443`, completes a handshake and reports what was negotiated.
pub async fn inspect_tls(domain: &str, timeout: Duration) -> Result<TlsInspection, ProbeError> {
    info!(domain, "Starting TLS inspection.");
    let domain_owned = domain.to_string();

    // rustls drives a blocking std socket here, so keep it off the runtime threads.
    debug!("Spawning blocking task for TLS handshake.");
    let inspection = spawn_blocking(move || perform_handshake(&domain_owned, timeout))
        .await
        .map_err(|e| {
            error!(panic = %e, "Blocking TLS task panicked!");
            ProbeError::Internal(format!("TLS task failed: {e}"))
        })??;

    info!(
        domain,
        cipher = ?inspection.cipher,
        version = ?inspection.version,
        has_certificate = inspection.peer_cert.is_some(),
        "TLS inspection finished."
    );
    Ok(inspection)
}

fn client_config() -> Result<ClientConfig, ProbeError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| ProbeError::Internal(format!("TLS configuration error: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(InspectOnlyVerifier(provider)))
        .with_no_client_auth();
    Ok(config)
}

fn perform_handshake(domain: &str, timeout: Duration) -> Result<TlsInspection, ProbeError> {
    let server_name = ServerName::try_from(domain.to_string()).map_err(|e| {
        warn!(domain, error = %e, "Domain is not a valid TLS server name.");
        ProbeError::Tls(format!("invalid server name: {e}"))
    })?;

    let address = (domain, TLS_PORT)
        .to_socket_addrs()
        .map_err(|e| ProbeError::Resolve(e.to_string()))?
        .next()
        .ok_or_else(|| ProbeError::Resolve(format!("{domain} has no address")))?;

    debug!(domain, %address, "Connecting TCP stream to port 443.");
    let mut socket = TcpStream::connect_timeout(&address, timeout).map_err(|e| {
        warn!(domain, error = %e, "TCP connection failed.");
        connect_error(e, timeout)
    })?;
    socket
        .set_read_timeout(Some(timeout))
        .and_then(|_| socket.set_write_timeout(Some(timeout)))
        .map_err(|e| ProbeError::Connect(e.to_string()))?;

    let mut connection = ClientConnection::new(Arc::new(client_config()?), server_name)
        .map_err(|e| ProbeError::Tls(e.to_string()))?;

    debug!(domain, "Performing TLS handshake.");
    while connection.is_handshaking() {
        connection.complete_io(&mut socket).map_err(|e| {
            warn!(domain, error = %e, "TLS handshake failed.");
            match e.kind() {
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                    ProbeError::Timeout(timeout.as_millis() as u64)
                }
                _ => ProbeError::Tls(e.to_string()),
            }
        })?;
    }

    let cipher = connection
        .negotiated_cipher_suite()
        .map(|suite| format!("{:?}", suite.suite()));
    let version = connection.protocol_version().map(|v| format!("{v:?}"));

    let peer_cert = match connection.peer_certificates().and_then(|chain| chain.first()) {
        Some(leaf) => Some(summarize_certificate(leaf.as_ref())?),
        None => {
            debug!(domain, "Handshake completed without a peer certificate.");
            None
        }
    };

    Ok(TlsInspection {
        cipher,
        version,
        peer_cert,
    })
}

fn connect_error(e: io::Error, timeout: Duration) -> ProbeError {
    match e.kind() {
        io::ErrorKind::TimedOut => ProbeError::Timeout(timeout.as_millis() as u64),
        _ => ProbeError::Connect(e.to_string()),
    }
}

/// Parses a DER certificate into the summary stored in the result document.
pub fn summarize_certificate(der: &[u8]) -> Result<CertificateSummary, ProbeError> {
    let (_, x509) = parse_x509_certificate(der).map_err(|e| {
        error!(error = %e, "Failed to parse X.509 certificate");
        ProbeError::Tls(format!("X.509 Parse Error: {e}"))
    })?;

    info!(subject = %x509.subject(), issuer = %x509.issuer(), "Successfully parsed certificate.");

    let validity = x509.validity();
    let not_before = asn1_time_to_chrono_utc(&validity.not_before);
    let not_after = asn1_time_to_chrono_utc(&validity.not_after);
    let now = Utc::now();

    let subject_alt_names = match x509.subject_alternative_name() {
        Ok(Some(san)) => san
            .value
            .general_names
            .iter()
            .filter_map(|name| match name {
                GeneralName::DNSName(dns) => Some(dns.to_string()),
                _ => None,
            })
            .collect(),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!(error = %e, "Malformed subjectAltName extension.");
            Vec::new()
        }
    };

    Ok(CertificateSummary {
        subject: x509.subject().to_string(),
        issuer: x509.issuer().to_string(),
        serial: x509.raw_serial_as_string(),
        not_before,
        not_after,
        days_until_expiry: not_after.signed_duration_since(now).num_days(),
        subject_alt_names,
        is_valid: now > not_before && now < not_after,
    })
}

fn asn1_time_to_chrono_utc(time: &ASN1Time) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or_default()
}
