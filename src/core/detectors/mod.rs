// src/core/detectors/mod.rs

// Pluggable finding producers. Each detector reads the results gathered so far
// and may do its own network work; `DetectorProbe` runs a list of them as one
// pipeline stage.
pub mod misconfigs;
pub mod vulnerabilities;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::models::{Finding, Stage};
use crate::core::results::ScanResults;
use crate::core::scanner::{to_value, Probe, ProbeTarget};
use crate::error::ProbeError;

pub use misconfigs::{EmailAuthDetector, SecurityHeadersDetector, VersionDisclosureDetector};
pub use vulnerabilities::{ExposedServicesDetector, TlsCertificateDetector};

#[async_trait]
pub trait Detector: Send + Sync {
    /// Short identifier recorded on every finding (e.g. "security-headers").
    fn name(&self) -> &'static str;

    async fn detect(&self, target: &ProbeTarget, results: &ScanResults) -> Result<Vec<Finding>, ProbeError>;
}

/// Runs detectors in order and concatenates their findings.
pub struct DetectorProbe {
    stage: Stage,
    detectors: Vec<Arc<dyn Detector>>,
}

impl DetectorProbe {
    pub fn new(stage: Stage, detectors: Vec<Arc<dyn Detector>>) -> Self {
        Self { stage, detectors }
    }

    /// Collects every detector's findings. A failing detector is skipped
    /// unless its error is fatal.
    pub async fn collect(&self, target: &ProbeTarget, results: &ScanResults) -> Result<Vec<Finding>, ProbeError> {
        let mut findings = Vec::new();
        for detector in &self.detectors {
            debug!(detector = detector.name(), "Running detector.");
            match detector.detect(target, results).await {
                Ok(found) => {
                    debug!(detector = detector.name(), count = found.len(), "Detector finished.");
                    findings.extend(found);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(detector = detector.name(), error = %e, "Detector failed, skipping.");
                }
            }
        }
        Ok(findings)
    }
}

#[async_trait]
impl Probe for DetectorProbe {
    fn stage(&self) -> Stage {
        self.stage
    }

    async fn run(&self, target: &ProbeTarget, results: &ScanResults) -> Result<Value, ProbeError> {
        let findings = self.collect(target, results).await?;
        info!(stage = %self.stage, count = findings.len(), "Detectors finished.");
        to_value(&findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, Result<Vec<&'static str>, ProbeError>);

    #[async_trait]
    impl Detector for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn detect(&self, _: &ProbeTarget, _: &ScanResults) -> Result<Vec<Finding>, ProbeError> {
            self.1
                .clone()
                .map(|codes| codes.into_iter().map(|c| Finding::new(self.0, c)).collect())
        }
    }

    #[tokio::test]
    async fn failing_detector_is_skipped() {
        let probe = DetectorProbe::new(
            Stage::SecurityMisconfigs,
            vec![
                Arc::new(Fixed("a", Ok(vec!["DNS_SPF_MISSING"]))),
                Arc::new(Fixed("b", Err(ProbeError::Resolve("SERVFAIL".into())))),
                Arc::new(Fixed("c", Ok(vec!["DNS_CAA_MISSING"]))),
            ],
        );
        let target = ProbeTarget::new("id", "example.com");
        let findings = probe.collect(&target, &ScanResults::new()).await.unwrap();
        let codes: Vec<_> = findings.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(codes, vec!["DNS_SPF_MISSING", "DNS_CAA_MISSING"]);
    }

    #[tokio::test]
    async fn fatal_detector_error_propagates() {
        let probe = DetectorProbe::new(
            Stage::Vulnerabilities,
            vec![Arc::new(Fixed("a", Err(ProbeError::Internal("bug".into()))))],
        );
        let target = ProbeTarget::new("id", "example.com");
        let err = probe.run(&target, &ScanResults::new()).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
