// src/core/models.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

// --- Scan lifecycle ---

/// Persisted status of a scan.
///
/// The only legal sequence is `pending -> scanning -> {completed | failed}`;
/// `scanning -> scanning` is allowed so progress can be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Scanning,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }

    /// Whether a scan currently in `self` may be moved to `next`.
    pub fn can_transition_to(self, next: ScanStatus) -> bool {
        use ScanStatus::*;
        matches!(
            (self, next),
            (Pending, Scanning)
                | (Scanning, Scanning)
                | (Scanning, Completed)
                | (Scanning, Failed)
        )
    }
}

/// One row of the `scans` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    pub id: String,
    pub domain: String,
    pub status: ScanStatus,
    pub progress: u8,
    pub updated_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl Scan {
    /// A fresh `pending` scan with a random UUID.
    pub fn new(domain: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            domain: domain.to_string(),
            status: ScanStatus::Pending,
            progress: 0,
            updated_at: Utc::now(),
            error_message: None,
        }
    }
}

/// One row of the `scan_results` table. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub scan_id: String,
    /// The JSON-encoded [`ResultDocument`].
    pub results: String,
    pub created_at: DateTime<Utc>,
}

impl ScanResult {
    pub fn document(&self) -> Result<ResultDocument, serde_json::Error> {
        serde_json::from_str(&self.results)
    }
}

// --- Stages ---

/// Every accumulator key the pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Dns,
    Whois,
    SslTls,
    Fingerprint,
    Network,
    OpenPorts,
    Subdomains,
    ApiEndpoints,
    Vulnerabilities,
    SecurityMisconfigs,
}

impl Stage {
    pub fn key(self) -> &'static str {
        self.into()
    }
}

// --- Findings ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

/// A single issue reported by a detector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    pub code: String,
    pub title: String,
    pub severity: Severity,
    pub detector: String,
    /// What triggered the finding, e.g. the open port or the leaked banner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl Finding {
    /// Builds a finding, taking its title and severity from the knowledge base
    /// when the code is catalogued there.
    pub fn new(detector: &str, code: &str) -> Self {
        match crate::core::knowledge_base::get_finding_detail(code) {
            Some(detail) => Self {
                code: code.to_string(),
                title: detail.title.to_string(),
                severity: detail.severity,
                detector: detector.to_string(),
                evidence: None,
            },
            None => Self {
                code: code.to_string(),
                title: code.to_string(),
                severity: Severity::Info,
                detector: detector.to_string(),
                evidence: None,
            },
        }
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }
}

// --- Probe values ---

/// Result of the reachability probe. Serialized as the bare strings
/// `"Reachable"` / `"Unreachable"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Reachability {
    Reachable,
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateSummary {
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub days_until_expiry: i64,
    pub subject_alt_names: Vec<String>,
    pub is_valid: bool,
}

/// What the TLS probe learned from one handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TlsInspection {
    pub cipher: Option<String>,
    pub version: Option<String>,
    pub peer_cert: Option<CertificateSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhoisRecord {
    /// The WHOIS server that produced the parsed answer.
    pub server: String,
    pub registrar: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub updated_date: Option<DateTime<Utc>>,
    pub name_servers: Vec<String>,
    pub status: Vec<String>,
}

// A struct to hold information about a detected technology (e.g., a web framework or CMS).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Technology {
    pub name: String,
    pub category: String,
    pub version: Option<String>,
}

// --- Events ---

/// Emitted after every progress change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub id: String,
    pub progress: u8,
    pub message: String,
}

/// Emitted once when a scan completes. `results` is the JSON-encoded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub id: String,
    pub results: String,
}

// --- Final document ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total_vulnerabilities: usize,
    pub open_ports: Vec<u16>,
    pub subdomains: Vec<String>,
    pub api_endpoints: Vec<String>,
}

/// The document persisted in `scan_results.results` and sent with the
/// completion event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    pub scan_id: String,
    pub domain: String,
    pub timestamp: DateTime<Utc>,
    pub results: BTreeMap<String, serde_json::Value>,
    pub summary: ScanSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_as_lowercase() {
        assert_eq!(ScanStatus::Scanning.to_string(), "scanning");
        assert_eq!(ScanStatus::from_str("failed").unwrap(), ScanStatus::Failed);
        assert_eq!(serde_json::to_string(&ScanStatus::Completed).unwrap(), "\"completed\"");
    }

    #[test]
    fn only_forward_transitions_are_allowed() {
        assert!(ScanStatus::Pending.can_transition_to(ScanStatus::Scanning));
        assert!(ScanStatus::Scanning.can_transition_to(ScanStatus::Scanning));
        assert!(ScanStatus::Scanning.can_transition_to(ScanStatus::Completed));
        assert!(!ScanStatus::Pending.can_transition_to(ScanStatus::Completed));
        assert!(!ScanStatus::Pending.can_transition_to(ScanStatus::Failed));
        assert!(!ScanStatus::Completed.can_transition_to(ScanStatus::Failed));
        assert!(!ScanStatus::Failed.can_transition_to(ScanStatus::Scanning));
        assert!(!ScanStatus::Scanning.can_transition_to(ScanStatus::Pending));
    }

    #[test]
    fn stage_keys_match_document_names() {
        assert_eq!(Stage::SslTls.key(), "ssl_tls");
        assert_eq!(Stage::OpenPorts.key(), "open_ports");
        assert_eq!(Stage::SecurityMisconfigs.key(), "security_misconfigs");
    }

    #[test]
    fn reachability_serializes_as_plain_string() {
        let v = serde_json::to_value(Reachability::Unreachable).unwrap();
        assert_eq!(v, serde_json::json!("Unreachable"));
    }

    #[test]
    fn finding_takes_metadata_from_knowledge_base() {
        let f = Finding::new("security-headers", "HEADERS_HSTS_MISSING");
        assert_eq!(f.severity, Severity::Warning);
        assert_eq!(f.title, "HSTS Header Missing");

        let unknown = Finding::new("custom", "SOMETHING_ELSE");
        assert_eq!(unknown.title, "SOMETHING_ELSE");
        assert_eq!(unknown.severity, Severity::Info);
    }
}
