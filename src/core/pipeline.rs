// src/core/pipeline.rs

use std::sync::Arc;

use crate::config::ProbeSettings;
use crate::core::detectors::{
    Detector, DetectorProbe, EmailAuthDetector, ExposedServicesDetector, SecurityHeadersDetector,
    TlsCertificateDetector, VersionDisclosureDetector,
};
use crate::core::models::Stage;
use crate::core::progress::{self, Milestone};
use crate::core::scanner::dns_scanner::{DnsProbe, SubdomainProbe};
use crate::core::scanner::endpoint_scanner::EndpointProbe;
use crate::core::scanner::fingerprint_scanner::FingerprintProbe;
use crate::core::scanner::network_scanner::{PortScanProbe, ReachabilityProbe};
use crate::core::scanner::ssl_scanner::SslProbe;
use crate::core::scanner::whois_scanner::WhoisProbe;
use crate::core::scanner::{build_endpoint_client, build_http_client, build_resolver, Probe};
use crate::error::ProbeError;

/// Probes that run one after another and share a progress milestone.
#[derive(Clone)]
pub struct Step {
    pub milestone: Milestone,
    pub probes: Vec<Arc<dyn Probe>>,
}

impl Step {
    pub fn new(milestone: Milestone, probes: Vec<Arc<dyn Probe>>) -> Self {
        Self { milestone, probes }
    }
}

/// The ordered list of steps a scan walks through.
#[derive(Clone)]
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Every stage in execution order.
    pub fn stages(&self) -> Vec<Stage> {
        self.steps
            .iter()
            .flat_map(|step| step.probes.iter().map(|probe| probe.stage()))
            .collect()
    }

    /// The full reconnaissance pipeline wired to real network probes.
    pub fn standard(settings: &ProbeSettings) -> Result<Self, ProbeError> {
        let resolver = build_resolver(settings);
        let client = build_http_client(settings)?;
        let endpoint_client = build_endpoint_client(settings)?;
        let connect_timeout = settings.connect_timeout();

        let vulnerability_detectors: Vec<Arc<dyn Detector>> =
            vec![Arc::new(TlsCertificateDetector), Arc::new(ExposedServicesDetector)];
        let misconfig_detectors: Vec<Arc<dyn Detector>> = vec![
            Arc::new(SecurityHeadersDetector::new(client.clone())),
            Arc::new(EmailAuthDetector::new(resolver.clone())),
            Arc::new(VersionDisclosureDetector),
        ];

        Ok(Self::new(vec![
            Step::new(
                progress::DNS_WHOIS,
                vec![
                    Arc::new(DnsProbe::new(resolver.clone())),
                    Arc::new(WhoisProbe::new(settings.whois_timeout())),
                ],
            ),
            Step::new(progress::TLS, vec![Arc::new(SslProbe::new(settings.http_timeout()))]),
            Step::new(progress::FINGERPRINT, vec![Arc::new(FingerprintProbe::new(client))]),
            Step::new(
                progress::NETWORK,
                vec![
                    Arc::new(ReachabilityProbe::new(connect_timeout)),
                    Arc::new(PortScanProbe::new(settings.ports.clone(), connect_timeout)),
                ],
            ),
            Step::new(
                progress::SUBDOMAINS,
                vec![Arc::new(SubdomainProbe::new(resolver, settings.subdomain_prefixes.clone()))],
            ),
            Step::new(
                progress::ENDPOINTS,
                vec![Arc::new(EndpointProbe::new(endpoint_client, settings.endpoint_paths.clone()))],
            ),
            Step::new(
                progress::VULNERABILITIES,
                vec![Arc::new(DetectorProbe::new(Stage::Vulnerabilities, vulnerability_detectors))],
            ),
            Step::new(
                progress::MISCONFIGS,
                vec![Arc::new(DetectorProbe::new(Stage::SecurityMisconfigs, misconfig_detectors))],
            ),
        ]))
    }
}
