// src/core/detectors/misconfigs.rs

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use tracing::debug;

use super::Detector;
use crate::core::models::{Finding, Stage, Technology};
use crate::core::results::ScanResults;
use crate::core::scanner::dns_scanner::{lookup_caa, lookup_dmarc, lookup_spf, DmarcRecord};
use crate::core::scanner::headers_scanner::{fetch_security_headers, SecurityHeaders};
use crate::core::scanner::ProbeTarget;
use crate::error::ProbeError;

/// Checks the landing page for the usual security headers.
pub struct SecurityHeadersDetector {
    client: reqwest::Client,
}

impl SecurityHeadersDetector {
    const NAME: &'static str = "security-headers";

    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// One finding per missing header.
pub fn missing_header_findings(detector: &str, headers: &SecurityHeaders) -> Vec<Finding> {
    [
        (&headers.hsts, "HEADERS_HSTS_MISSING"),
        (&headers.csp, "HEADERS_CSP_MISSING"),
        (&headers.x_frame_options, "HEADERS_X_FRAME_OPTIONS_MISSING"),
        (&headers.x_content_type_options, "HEADERS_X_CONTENT_TYPE_OPTIONS_MISSING"),
    ]
    .into_iter()
    .filter(|(value, _)| value.is_none())
    .map(|(_, code)| Finding::new(detector, code))
    .collect()
}

#[async_trait]
impl Detector for SecurityHeadersDetector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn detect(&self, target: &ProbeTarget, _results: &ScanResults) -> Result<Vec<Finding>, ProbeError> {
        match fetch_security_headers(&self.client, &target.domain).await {
            Ok(headers) => Ok(missing_header_findings(Self::NAME, &headers)),
            // An unreachable landing page is itself worth reporting.
            Err(e) => {
                debug!(error = %e, "Request error detected, adding HEADERS_REQUEST_FAILED finding.");
                Ok(vec![Finding::new(Self::NAME, "HEADERS_REQUEST_FAILED").with_evidence(e.to_string())])
            }
        }
    }
}

/// Checks SPF, DMARC and CAA records.
pub struct EmailAuthDetector {
    resolver: TokioAsyncResolver,
}

impl EmailAuthDetector {
    const NAME: &'static str = "email-auth";

    pub fn new(resolver: TokioAsyncResolver) -> Self {
        Self { resolver }
    }
}

/// Turns the looked-up records into findings.
pub fn email_auth_findings(
    detector: &str,
    spf: Option<&str>,
    dmarc: Option<&DmarcRecord>,
    caa: &[String],
) -> Vec<Finding> {
    let mut findings = Vec::new();

    match spf {
        None => findings.push(Finding::new(detector, "DNS_SPF_MISSING")),
        Some(record) if record.contains("~all") => {
            findings.push(Finding::new(detector, "DNS_SPF_POLICY_SOFTFAIL").with_evidence(record))
        }
        Some(record) if record.contains("?all") => {
            findings.push(Finding::new(detector, "DNS_SPF_POLICY_NEUTRAL").with_evidence(record))
        }
        Some(_) => {}
    }

    match dmarc {
        None => findings.push(Finding::new(detector, "DNS_DMARC_MISSING")),
        Some(dmarc) if dmarc.policy.as_deref() == Some("none") => findings
            .push(Finding::new(detector, "DNS_DMARC_POLICY_NONE").with_evidence(dmarc.record.clone())),
        Some(_) => {}
    }

    if caa.is_empty() {
        findings.push(Finding::new(detector, "DNS_CAA_MISSING"));
    }

    findings
}

#[async_trait]
impl Detector for EmailAuthDetector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn detect(&self, target: &ProbeTarget, _results: &ScanResults) -> Result<Vec<Finding>, ProbeError> {
        let (spf, dmarc, caa) = tokio::try_join!(
            lookup_spf(&self.resolver, &target.domain),
            lookup_dmarc(&self.resolver, &target.domain),
            lookup_caa(&self.resolver, &target.domain),
        )?;
        Ok(email_auth_findings(Self::NAME, spf.as_deref(), dmarc.as_ref(), &caa))
    }
}

/// Flags fingerprinted technologies whose banners reveal an exact version.
pub struct VersionDisclosureDetector;

#[async_trait]
impl Detector for VersionDisclosureDetector {
    fn name(&self) -> &'static str {
        "version-disclosure"
    }

    async fn detect(&self, _target: &ProbeTarget, results: &ScanResults) -> Result<Vec<Finding>, ProbeError> {
        let technologies: Vec<Technology> = results.decode(Stage::Fingerprint).unwrap_or_default();
        Ok(technologies
            .iter()
            .filter_map(|tech| {
                let version = tech.version.as_ref()?;
                Some(
                    Finding::new(self.name(), "HTTP_VERSION_DISCLOSURE")
                        .with_evidence(format!("{} {}", tech.name, version)),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codes(findings: &[Finding]) -> Vec<&str> {
        findings.iter().map(|f| f.code.as_str()).collect()
    }

    #[test]
    fn reports_each_missing_header() {
        let headers = SecurityHeaders {
            hsts: Some("max-age=31536000".into()),
            csp: None,
            x_frame_options: Some("DENY".into()),
            x_content_type_options: None,
        };
        let findings = missing_header_findings("security-headers", &headers);
        assert_eq!(
            codes(&findings),
            vec!["HEADERS_CSP_MISSING", "HEADERS_X_CONTENT_TYPE_OPTIONS_MISSING"]
        );
    }

    #[test]
    fn weak_email_policies_are_flagged() {
        let dmarc = DmarcRecord {
            record: "v=DMARC1; p=none".into(),
            policy: Some("none".into()),
        };
        let findings = email_auth_findings(
            "email-auth",
            Some("v=spf1 include:_spf.example.com ~all"),
            Some(&dmarc),
            &["0 issue \"letsencrypt.org\"".to_string()],
        );
        assert_eq!(codes(&findings), vec!["DNS_SPF_POLICY_SOFTFAIL", "DNS_DMARC_POLICY_NONE"]);
    }

    #[test]
    fn absent_records_are_flagged() {
        let findings = email_auth_findings("email-auth", None, None, &[]);
        assert_eq!(
            codes(&findings),
            vec!["DNS_SPF_MISSING", "DNS_DMARC_MISSING", "DNS_CAA_MISSING"]
        );
    }

    #[test]
    fn strict_policies_produce_no_findings() {
        let dmarc = DmarcRecord {
            record: "v=DMARC1; p=reject".into(),
            policy: Some("reject".into()),
        };
        let findings = email_auth_findings(
            "email-auth",
            Some("v=spf1 mx -all"),
            Some(&dmarc),
            &["0 issue \"digicert.com\"".to_string()],
        );
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn versioned_technologies_are_disclosures() {
        let mut results = ScanResults::new();
        results.record(
            Stage::Fingerprint,
            Ok(json!([
                {"name": "Nginx", "category": "Web Server", "version": "1.25.3"},
                {"name": "React", "category": "JS Library", "version": null}
            ])),
        );
        let target = ProbeTarget::new("id", "example.com");
        let findings = VersionDisclosureDetector.detect(&target, &results).await.unwrap();
        assert_eq!(codes(&findings), vec!["HTTP_VERSION_DISCLOSURE"]);
        assert_eq!(findings[0].evidence.as_deref(), Some("Nginx 1.25.3"));
    }
}
