// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use vanguard_recon::core::models::{Scan, ScanResult, ScanStatus, Stage};
use vanguard_recon::core::notify::{NotificationSink, ScanEvent};
use vanguard_recon::core::pipeline::{Pipeline, Step};
use vanguard_recon::core::progress;
use vanguard_recon::core::results::ScanResults;
use vanguard_recon::core::scanner::{Probe, ProbeTarget};
use vanguard_recon::core::store::{MemoryStore, ScanStore};
use vanguard_recon::error::{ProbeError, StoreError};
use vanguard_recon::core::models::{CompletionEvent, ProgressEvent};

// --- Probes ---

/// Returns a fixed outcome.
pub struct StaticProbe {
    stage: Stage,
    outcome: Result<Value, ProbeError>,
}

impl StaticProbe {
    pub fn ok(stage: Stage, value: Value) -> Arc<dyn Probe> {
        Arc::new(Self { stage, outcome: Ok(value) })
    }

    pub fn err(stage: Stage, error: ProbeError) -> Arc<dyn Probe> {
        Arc::new(Self { stage, outcome: Err(error) })
    }
}

#[async_trait]
impl Probe for StaticProbe {
    fn stage(&self) -> Stage {
        self.stage
    }

    async fn run(&self, _target: &ProbeTarget, _results: &ScanResults) -> Result<Value, ProbeError> {
        self.outcome.clone()
    }
}

/// Reports `www.<domain>` as the only subdomain, so results can be attributed.
pub struct EchoSubdomainProbe;

#[async_trait]
impl Probe for EchoSubdomainProbe {
    fn stage(&self) -> Stage {
        Stage::Subdomains
    }

    async fn run(&self, target: &ProbeTarget, _results: &ScanResults) -> Result<Value, ProbeError> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(json!([format!("www.{}", target.domain)]))
    }
}

pub struct PanickingProbe(pub Stage);

#[async_trait]
impl Probe for PanickingProbe {
    fn stage(&self) -> Stage {
        self.0
    }

    async fn run(&self, _target: &ProbeTarget, _results: &ScanResults) -> Result<Value, ProbeError> {
        panic!("probe exploded");
    }
}

pub struct SlowProbe {
    pub stage: Stage,
    pub delay: Duration,
}

#[async_trait]
impl Probe for SlowProbe {
    fn stage(&self) -> Stage {
        self.stage
    }

    async fn run(&self, _target: &ProbeTarget, _results: &ScanResults) -> Result<Value, ProbeError> {
        tokio::time::sleep(self.delay).await;
        Ok(json!("late"))
    }
}

/// Blocks until the test hands out a permit.
pub struct GateProbe {
    pub stage: Stage,
    pub gate: Arc<Semaphore>,
}

#[async_trait]
impl Probe for GateProbe {
    fn stage(&self) -> Stage {
        self.stage
    }

    async fn run(&self, _target: &ProbeTarget, _results: &ScanResults) -> Result<Value, ProbeError> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ProbeError::Internal(e.to_string()))?;
        permit.forget();
        Ok(json!("Reachable"))
    }
}

// --- Pipelines ---

/// Every stage answers instantly; mirrors an `example.com` scan.
pub fn example_probes() -> Vec<(Stage, Arc<dyn Probe>)> {
    vec![
        (Stage::Dns, StaticProbe::ok(Stage::Dns, json!(["93.184.216.34"]))),
        (Stage::Whois, StaticProbe::ok(Stage::Whois, json!({"server": "whois.iana.org", "registrar": "RESERVED-Internet Assigned Numbers Authority", "creation_date": null, "expiration_date": null, "updated_date": null, "name_servers": [], "status": []}))),
        (Stage::SslTls, StaticProbe::ok(Stage::SslTls, json!({"cipher": "TLS13_AES_256_GCM_SHA384", "version": "TLSv1_3", "peer_cert": null}))),
        (Stage::Fingerprint, StaticProbe::ok(Stage::Fingerprint, json!([]))),
        (Stage::Network, StaticProbe::ok(Stage::Network, json!("Reachable"))),
        (Stage::OpenPorts, StaticProbe::ok(Stage::OpenPorts, json!([443]))),
        (Stage::Subdomains, StaticProbe::ok(Stage::Subdomains, json!([]))),
        (Stage::ApiEndpoints, StaticProbe::ok(Stage::ApiEndpoints, json!([]))),
        (Stage::Vulnerabilities, StaticProbe::ok(Stage::Vulnerabilities, json!([]))),
        (Stage::SecurityMisconfigs, StaticProbe::ok(Stage::SecurityMisconfigs, json!([]))),
    ]
}

/// Groups probes into the standard steps, replacing stages found in `overrides`.
pub fn pipeline_with(overrides: Vec<Arc<dyn Probe>>) -> Pipeline {
    let mut probes = example_probes();
    for probe in overrides {
        if let Some(slot) = probes.iter_mut().find(|(stage, _)| *stage == probe.stage()) {
            slot.1 = probe;
        }
    }
    let take = |stages: &[Stage]| -> Vec<Arc<dyn Probe>> {
        probes
            .iter()
            .filter(|(stage, _)| stages.contains(stage))
            .map(|(_, probe)| Arc::clone(probe))
            .collect()
    };

    Pipeline::new(vec![
        Step::new(progress::DNS_WHOIS, take(&[Stage::Dns, Stage::Whois])),
        Step::new(progress::TLS, take(&[Stage::SslTls])),
        Step::new(progress::FINGERPRINT, take(&[Stage::Fingerprint])),
        Step::new(progress::NETWORK, take(&[Stage::Network, Stage::OpenPorts])),
        Step::new(progress::SUBDOMAINS, take(&[Stage::Subdomains])),
        Step::new(progress::ENDPOINTS, take(&[Stage::ApiEndpoints])),
        Step::new(progress::VULNERABILITIES, take(&[Stage::Vulnerabilities])),
        Step::new(progress::MISCONFIGS, take(&[Stage::SecurityMisconfigs])),
    ])
}

pub fn example_pipeline() -> Pipeline {
    pipeline_with(Vec::new())
}

// --- Sink ---

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ScanEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ScanEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress_for(&self, scan_id: &str) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ScanEvent::Progress(p) if p.id == scan_id => Some(p.progress),
                _ => None,
            })
            .collect()
    }

    pub fn completions_for(&self, scan_id: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ScanEvent::Complete(c) if c.id == scan_id => Some(c.results),
                _ => None,
            })
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn emit_progress(&self, scan_id: &str, progress: u8, message: &str) {
        self.events.lock().unwrap().push(ScanEvent::Progress(ProgressEvent {
            id: scan_id.to_string(),
            progress,
            message: message.to_string(),
        }));
    }

    fn emit_complete(&self, scan_id: &str, document: &str) {
        self.events.lock().unwrap().push(ScanEvent::Complete(CompletionEvent {
            id: scan_id.to_string(),
            results: document.to_string(),
        }));
    }
}

// --- Store ---

/// Wraps a store and remembers every persisted `(status, progress)` pair.
pub struct RecordingStore<S> {
    inner: S,
    writes: Mutex<Vec<(String, ScanStatus, u8)>>,
    fail_save: bool,
}

impl<S: ScanStore> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            writes: Mutex::new(Vec::new()),
            fail_save: false,
        }
    }

    /// Makes `save_result` fail without touching the inner store.
    pub fn failing_saves(mut self) -> Self {
        self.fail_save = true;
        self
    }

    pub fn writes_for(&self, scan_id: &str) -> Vec<(ScanStatus, u8)> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _, _)| id == scan_id)
            .map(|(_, status, progress)| (*status, *progress))
            .collect()
    }
}

pub fn memory_store() -> RecordingStore<MemoryStore> {
    RecordingStore::new(MemoryStore::new())
}

#[async_trait]
impl<S: ScanStore> ScanStore for RecordingStore<S> {
    async fn create_scan(&self, domain: &str) -> Result<Scan, StoreError> {
        let scan = self.inner.create_scan(domain).await?;
        self.writes
            .lock()
            .unwrap()
            .push((scan.id.clone(), scan.status, scan.progress));
        Ok(scan)
    }

    async fn get_scan(&self, scan_id: &str) -> Result<Scan, StoreError> {
        self.inner.get_scan(scan_id).await
    }

    async fn get_result(&self, scan_id: &str) -> Result<Option<ScanResult>, StoreError> {
        self.inner.get_result(scan_id).await
    }

    async fn update_status(
        &self,
        scan_id: &str,
        status: ScanStatus,
        progress: u8,
        error_message: Option<&str>,
    ) -> Result<Scan, StoreError> {
        let scan = self
            .inner
            .update_status(scan_id, status, progress, error_message)
            .await?;
        self.writes
            .lock()
            .unwrap()
            .push((scan.id.clone(), scan.status, scan.progress));
        Ok(scan)
    }

    async fn save_result(&self, scan_id: &str, document: &str) -> Result<ScanResult, StoreError> {
        if self.fail_save {
            return Err(StoreError::Task("disk full".to_string()));
        }
        let result = self.inner.save_result(scan_id, document).await?;
        self.writes
            .lock()
            .unwrap()
            .push((scan_id.to_string(), ScanStatus::Completed, 100));
        Ok(result)
    }
}

/// Polls until the scan reaches `status` or two seconds pass.
pub async fn wait_for_status(store: &dyn ScanStore, scan_id: &str, status: ScanStatus) -> bool {
    for _ in 0..200 {
        if let Ok(scan) = store.get_scan(scan_id).await {
            if scan.status == status {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
