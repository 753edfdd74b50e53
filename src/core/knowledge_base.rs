// src/core/knowledge_base.rs

//! Static catalogue of every finding a detector can emit.
//!
//! Detectors only produce codes; titles, severities and the human-readable
//! explanation live here so that the scan document and the terminal host
//! describe a finding the same way.

use crate::core::models::Severity;
use std::fmt;

/// Groups findings for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FindingCategory {
    /// DNS records (SPF, DMARC, CAA).
    Dns,
    /// TLS certificate and handshake.
    Ssl,
    /// HTTP response headers and banners.
    Http,
    /// Services reachable on well-known ports.
    Network,
}

impl fmt::Display for FindingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingCategory::Dns => write!(f, "DNS Configuration"),
            FindingCategory::Ssl => write!(f, "SSL/TLS Certificate"),
            FindingCategory::Http => write!(f, "HTTP Security"),
            FindingCategory::Network => write!(f, "Exposed Services"),
        }
    }
}

/// Everything needed to present a finding to a user.
pub struct FindingDetail {
    /// Machine-readable identifier (e.g. "DNS_DMARC_MISSING").
    pub code: &'static str,
    pub title: &'static str,
    pub category: FindingCategory,
    pub severity: Severity,
    /// What the finding means and why it matters.
    pub description: &'static str,
    /// Actionable steps to fix it.
    pub remediation: &'static str,
}

static FINDINGS: &[FindingDetail] = &[
    // --- DNS ---
    FindingDetail {
        code: "DNS_DMARC_MISSING",
        title: "DMARC Record Missing",
        category: FindingCategory::Dns,
        severity: Severity::Critical,
        description: "No DMARC policy is published at _dmarc.<domain>. Receiving mail servers have no instruction for mail that fails SPF/DKIM, which makes spoofing the domain easy.",
        remediation: "Publish a TXT record at _dmarc.<domain>, starting with 'v=DMARC1; p=none; rua=mailto:...' and tightening to 'p=quarantine' or 'p=reject' once reports look clean.",
    },
    FindingDetail {
        code: "DNS_DMARC_POLICY_NONE",
        title: "DMARC Policy is 'none'",
        category: FindingCategory::Dns,
        severity: Severity::Warning,
        description: "The DMARC policy only monitors. Spoofed mail is reported but still delivered.",
        remediation: "Move the policy to 'p=quarantine' or 'p=reject' after confirming legitimate senders pass SPF/DKIM.",
    },
    FindingDetail {
        code: "DNS_SPF_MISSING",
        title: "SPF Record Missing",
        category: FindingCategory::Dns,
        severity: Severity::Warning,
        description: "No 'v=spf1' TXT record lists the servers allowed to send mail for this domain.",
        remediation: "Publish an SPF TXT record naming your mail providers and ending in '-all', e.g. 'v=spf1 include:_spf.google.com -all'.",
    },
    FindingDetail {
        code: "DNS_SPF_POLICY_SOFTFAIL",
        title: "SPF Policy is 'Softfail'",
        category: FindingCategory::Dns,
        severity: Severity::Info,
        description: "The SPF record ends in '~all', so unauthorised senders are only marked, not rejected.",
        remediation: "Once every legitimate sender is listed, switch the qualifier to '-all'.",
    },
    FindingDetail {
        code: "DNS_SPF_POLICY_NEUTRAL",
        title: "SPF Policy is 'Neutral'",
        category: FindingCategory::Dns,
        severity: Severity::Info,
        description: "The SPF record ends in '?all', which expresses no policy at all.",
        remediation: "Replace '?all' with '~all' or, preferably, '-all'.",
    },
    FindingDetail {
        code: "DNS_CAA_MISSING",
        title: "CAA Record Missing",
        category: FindingCategory::Dns,
        severity: Severity::Info,
        description: "Without CAA records any certificate authority may issue certificates for the domain.",
        remediation: "Add CAA records for the authorities you use, for example '0 issue \"letsencrypt.org\"'.",
    },
    // --- SSL/TLS ---
    FindingDetail {
        code: "SSL_HANDSHAKE_FAILED",
        title: "TLS Handshake Failed",
        category: FindingCategory::Ssl,
        severity: Severity::Critical,
        description: "No TLS session could be established on port 443. The port may be closed, or the server's TLS configuration is broken.",
        remediation: "Serve HTTPS on port 443 with a certificate for this host name and modern protocol versions (TLS 1.2+).",
    },
    FindingDetail {
        code: "SSL_NO_CERTIFICATE",
        title: "No Certificate Presented",
        category: FindingCategory::Ssl,
        severity: Severity::Warning,
        description: "The handshake completed but the server did not present a certificate chain.",
        remediation: "Configure the server with a certificate and its intermediate chain.",
    },
    FindingDetail {
        code: "SSL_EXPIRED",
        title: "SSL Certificate Expired",
        category: FindingCategory::Ssl,
        severity: Severity::Critical,
        description: "The certificate is outside its validity window. Browsers will block the site with a security warning.",
        remediation: "Renew the certificate now and automate renewal (e.g. ACME / Let's Encrypt).",
    },
    FindingDetail {
        code: "SSL_EXPIRING_SOON",
        title: "SSL Certificate Expiring Soon",
        category: FindingCategory::Ssl,
        severity: Severity::Warning,
        description: "The certificate expires within 30 days.",
        remediation: "Renew the certificate and check that automated renewal is working.",
    },
    // --- HTTP ---
    FindingDetail {
        code: "HEADERS_REQUEST_FAILED",
        title: "HTTP Request Failed",
        category: FindingCategory::Http,
        severity: Severity::Critical,
        description: "The landing page over HTTPS could not be fetched, so its security headers could not be checked.",
        remediation: "Verify that the site answers on https://<domain>/ from the public internet.",
    },
    FindingDetail {
        code: "HEADERS_HSTS_MISSING",
        title: "HSTS Header Missing",
        category: FindingCategory::Http,
        severity: Severity::Warning,
        description: "Without Strict-Transport-Security browsers may be downgraded to plain HTTP.",
        remediation: "Send 'Strict-Transport-Security: max-age=31536000; includeSubDomains'.",
    },
    FindingDetail {
        code: "HEADERS_CSP_MISSING",
        title: "CSP Header Missing",
        category: FindingCategory::Http,
        severity: Severity::Warning,
        description: "No Content-Security-Policy restricts where scripts and other resources may load from, which widens the impact of XSS.",
        remediation: "Define a Content-Security-Policy, starting restrictive (default-src 'self') and relaxing where needed.",
    },
    FindingDetail {
        code: "HEADERS_X_FRAME_OPTIONS_MISSING",
        title: "X-Frame-Options Missing",
        category: FindingCategory::Http,
        severity: Severity::Warning,
        description: "Pages can be framed by other origins, enabling clickjacking.",
        remediation: "Send 'X-Frame-Options: DENY' or 'SAMEORIGIN' (or a CSP frame-ancestors directive).",
    },
    FindingDetail {
        code: "HEADERS_X_CONTENT_TYPE_OPTIONS_MISSING",
        title: "X-Content-Type-Options Missing",
        category: FindingCategory::Http,
        severity: Severity::Info,
        description: "Browsers may MIME-sniff responses and execute content as a different type.",
        remediation: "Send 'X-Content-Type-Options: nosniff'.",
    },
    FindingDetail {
        code: "HTTP_VERSION_DISCLOSURE",
        title: "Software Version Disclosed",
        category: FindingCategory::Http,
        severity: Severity::Info,
        description: "Response headers or markup reveal exact software versions, which helps attackers pick known exploits.",
        remediation: "Strip version numbers from Server / X-Powered-By headers and generator meta tags.",
    },
    // --- Network ---
    FindingDetail {
        code: "NET_FTP_EXPOSED",
        title: "FTP Service Exposed",
        category: FindingCategory::Network,
        severity: Severity::Warning,
        description: "Port 21 accepts connections. FTP sends credentials and data in clear text.",
        remediation: "Close port 21 or replace FTP with SFTP/FTPS restricted to known clients.",
    },
    FindingDetail {
        code: "NET_TELNET_EXPOSED",
        title: "Telnet Service Exposed",
        category: FindingCategory::Network,
        severity: Severity::Critical,
        description: "Port 23 accepts connections. Telnet offers unencrypted remote login.",
        remediation: "Disable Telnet and use SSH instead.",
    },
    FindingDetail {
        code: "NET_RDP_EXPOSED",
        title: "RDP Service Exposed",
        category: FindingCategory::Network,
        severity: Severity::Critical,
        description: "Port 3389 accepts connections from the internet. Exposed RDP is a common ransomware entry point.",
        remediation: "Put RDP behind a VPN or gateway and restrict it by source address.",
    },
];

/// Looks up the catalogue entry for a finding code.
pub fn get_finding_detail(code: &str) -> Option<&'static FindingDetail> {
    FINDINGS.iter().find(|f| f.code == code)
}
