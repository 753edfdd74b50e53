// src/core/results.rs

use std::collections::BTreeMap;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::core::models::{Finding, ResultDocument, ScanSummary, Stage};
use crate::error::ProbeError;

/// What a stage produced: a structured value, or the error string of a failed probe.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Value(Value),
    Error(String),
}

impl Outcome {
    /// JSON form stored in the result document. Errors are stored as the bare string.
    pub fn to_json(&self) -> Value {
        match self {
            Outcome::Value(value) => value.clone(),
            Outcome::Error(message) => Value::String(message.clone()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }
}

impl From<Result<Value, ProbeError>> for Outcome {
    fn from(result: Result<Value, ProbeError>) -> Self {
        match result {
            Ok(value) => Outcome::Value(value),
            Err(e) => Outcome::Error(e.to_string()),
        }
    }
}

/// The per-scan accumulator. Owned by one coordinator and lent read-only to
/// probes and detectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResults {
    outcomes: BTreeMap<Stage, Outcome>,
}

impl ScanResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a stage outcome, replacing any earlier one for the same stage.
    pub fn record(&mut self, stage: Stage, result: Result<Value, ProbeError>) {
        self.outcomes.insert(stage, Outcome::from(result));
    }

    pub fn insert(&mut self, stage: Stage, outcome: Outcome) {
        self.outcomes.insert(stage, outcome);
    }

    pub fn get(&self, stage: Stage) -> Option<&Outcome> {
        self.outcomes.get(&stage)
    }

    /// The stage's value, or `None` if it failed or has not run.
    pub fn value(&self, stage: Stage) -> Option<&Value> {
        match self.outcomes.get(&stage)? {
            Outcome::Value(value) => Some(value),
            Outcome::Error(_) => None,
        }
    }

    /// Decodes a stage value into its typed form. Missing, failed and
    /// malformed stages all read as `None`.
    pub fn decode<T: DeserializeOwned>(&self, stage: Stage) -> Option<T> {
        self.value(stage)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.outcomes.keys().copied()
    }

    /// The `results` object of the final document.
    pub fn to_json_map(&self) -> BTreeMap<String, Value> {
        self.outcomes
            .iter()
            .map(|(stage, outcome)| (stage.key().to_string(), outcome.to_json()))
            .collect()
    }

    /// Derives the summary block. A failed or missing stage contributes nothing.
    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            total_vulnerabilities: self
                .decode::<Vec<Finding>>(Stage::Vulnerabilities)
                .map_or(0, |findings| findings.len()),
            open_ports: self.decode(Stage::OpenPorts).unwrap_or_default(),
            subdomains: self.decode(Stage::Subdomains).unwrap_or_default(),
            api_endpoints: self.decode(Stage::ApiEndpoints).unwrap_or_default(),
        }
    }
}

/// Assembles the final document, timestamped now.
pub fn build_document(scan_id: &str, domain: &str, results: &ScanResults) -> ResultDocument {
    ResultDocument {
        scan_id: scan_id.to_string(),
        domain: domain.to_string(),
        timestamp: Utc::now(),
        results: results.to_json_map(),
        summary: results.summary(),
    }
}

pub fn encode_document<T: Serialize>(document: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ScanResults {
        let mut results = ScanResults::new();
        results.record(Stage::Dns, Ok(json!(["93.184.216.34"])));
        results.record(Stage::SslTls, Err(ProbeError::Connect("Connection refused".into())));
        results.record(Stage::OpenPorts, Ok(json!([80, 443])));
        results.record(Stage::Subdomains, Ok(json!([])));
        results.record(
            Stage::Vulnerabilities,
            Ok(json!([{
                "code": "NET_FTP_EXPOSED",
                "title": "FTP Service Exposed",
                "severity": "Warning",
                "detector": "exposed-services"
            }])),
        );
        results
    }

    #[test]
    fn errors_are_stored_as_plain_strings() {
        let map = sample().to_json_map();
        assert_eq!(map["ssl_tls"], json!("TCP Connection Error: Connection refused"));
        assert_eq!(map["dns"], json!(["93.184.216.34"]));
    }

    #[test]
    fn summary_reads_typed_stage_values() {
        let summary = sample().summary();
        assert_eq!(summary.total_vulnerabilities, 1);
        assert_eq!(summary.open_ports, vec![80, 443]);
        assert!(summary.subdomains.is_empty());
        assert!(summary.api_endpoints.is_empty());
    }

    #[test]
    fn failed_stage_contributes_nothing_to_summary() {
        let mut results = ScanResults::new();
        results.record(Stage::OpenPorts, Err(ProbeError::Timeout(2000)));
        assert!(results.summary().open_ports.is_empty());
        assert!(results.get(Stage::OpenPorts).unwrap().is_error());
    }

    #[test]
    fn document_serialization_is_idempotent() {
        let document = build_document("id-1", "example.com", &sample());
        let first = encode_document(&document).unwrap();
        let decoded: ResultDocument = serde_json::from_str(&first).unwrap();
        assert_eq!(decoded, document);

        // Re-encoding an already encoded document changes nothing.
        let as_value: Value = serde_json::from_str(&first).unwrap();
        let second = encode_document(&as_value).unwrap();
        let reparsed: Value = serde_json::from_str(&second).unwrap();
        assert_eq!(reparsed, as_value);
        assert_eq!(encode_document(&reparsed).unwrap(), second);
    }
}
