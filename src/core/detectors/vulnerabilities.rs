// src/core/detectors/vulnerabilities.rs

use async_trait::async_trait;
use tracing::debug;

use super::Detector;
use crate::core::models::{Finding, Stage, TlsInspection};
use crate::core::results::{Outcome, ScanResults};
use crate::core::scanner::ProbeTarget;
use crate::error::ProbeError;

/// Days before expiry at which a certificate is flagged.
const EXPIRY_WARNING_DAYS: i64 = 30;

/// Flags handshake failures and expired or expiring certificates from the
/// `ssl_tls` stage. Does nothing if that stage has not run.
pub struct TlsCertificateDetector;

impl TlsCertificateDetector {
    const NAME: &'static str = "tls-certificate";

    fn analyze(outcome: &Outcome) -> Vec<Finding> {
        let inspection = match outcome {
            Outcome::Error(message) => {
                debug!("Handshake failed, adding SSL_HANDSHAKE_FAILED finding.");
                return vec![Finding::new(Self::NAME, "SSL_HANDSHAKE_FAILED").with_evidence(message.clone())];
            }
            Outcome::Value(value) => match serde_json::from_value::<TlsInspection>(value.clone()) {
                Ok(inspection) => inspection,
                Err(_) => return Vec::new(),
            },
        };

        let Some(cert) = inspection.peer_cert else {
            debug!("No certificate found, adding SSL_NO_CERTIFICATE finding.");
            return vec![Finding::new(Self::NAME, "SSL_NO_CERTIFICATE")];
        };

        let mut findings = Vec::new();
        if !cert.is_valid {
            debug!(expiry_date = %cert.not_after, "Certificate outside its validity window.");
            findings.push(
                Finding::new(Self::NAME, "SSL_EXPIRED").with_evidence(format!("not after {}", cert.not_after)),
            );
        }
        if (0..=EXPIRY_WARNING_DAYS).contains(&cert.days_until_expiry) {
            debug!(days_left = cert.days_until_expiry, "Certificate is expiring soon.");
            findings.push(
                Finding::new(Self::NAME, "SSL_EXPIRING_SOON")
                    .with_evidence(format!("{} days left", cert.days_until_expiry)),
            );
        }
        findings
    }
}

#[async_trait]
impl Detector for TlsCertificateDetector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn detect(&self, _target: &ProbeTarget, results: &ScanResults) -> Result<Vec<Finding>, ProbeError> {
        Ok(results.get(Stage::SslTls).map(Self::analyze).unwrap_or_default())
    }
}

/// Flags cleartext or remote-desktop services among the open ports.
pub struct ExposedServicesDetector;

const EXPOSED_SERVICES: [(u16, &str); 3] = [
    (21, "NET_FTP_EXPOSED"),
    (23, "NET_TELNET_EXPOSED"),
    (3389, "NET_RDP_EXPOSED"),
];

#[async_trait]
impl Detector for ExposedServicesDetector {
    fn name(&self) -> &'static str {
        "exposed-services"
    }

    async fn detect(&self, _target: &ProbeTarget, results: &ScanResults) -> Result<Vec<Finding>, ProbeError> {
        let open_ports: Vec<u16> = results.decode(Stage::OpenPorts).unwrap_or_default();
        Ok(EXPOSED_SERVICES
            .iter()
            .filter(|(port, _)| open_ports.contains(port))
            .map(|(port, code)| Finding::new(self.name(), code).with_evidence(format!("port {port} open")))
            .collect())
    }
}
