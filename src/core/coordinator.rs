// src/core/coordinator.rs

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::models::{ResultDocument, ScanStatus};
use crate::core::notify::NotificationSink;
use crate::core::pipeline::Pipeline;
use crate::core::progress::{self, ProgressTracker};
use crate::core::results::{build_document, encode_document, ScanResults};
use crate::core::scanner::{Probe, ProbeTarget};
use crate::core::store::ScanStore;
use crate::error::{ProbeError, ScanError};

/// Default outer bound for a single probe.
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Drives one scan through the pipeline.
///
/// The coordinator owns the scan's results for its whole run; probes only
/// ever see a read-only snapshot. Probe errors are recorded as outcomes. A
/// store or serialization failure, a panicking probe, cancellation or the
/// scan deadline moves the scan to `failed` and is returned to the caller.
pub struct ScanCoordinator {
    scan_id: String,
    domain: String,
    store: Arc<dyn ScanStore>,
    sink: Arc<dyn NotificationSink>,
    pipeline: Pipeline,
    cancel: CancellationToken,
    scan_timeout: Option<Duration>,
    probe_timeout: Duration,
}

impl ScanCoordinator {
    pub fn new(
        scan_id: &str,
        domain: &str,
        store: Arc<dyn ScanStore>,
        sink: Arc<dyn NotificationSink>,
        pipeline: Pipeline,
    ) -> Self {
        Self {
            scan_id: scan_id.to_string(),
            domain: domain.to_string(),
            store,
            sink,
            pipeline,
            cancel: CancellationToken::new(),
            scan_timeout: None,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Whole-scan deadline, checked between probes. `None` disables it.
    pub fn with_scan_timeout(mut self, limit: Option<Duration>) -> Self {
        self.scan_timeout = limit;
        self
    }

    pub fn with_probe_timeout(mut self, limit: Duration) -> Self {
        self.probe_timeout = limit;
        self
    }

    pub async fn run(self) -> Result<ResultDocument, ScanError> {
        let started = Instant::now();
        let mut tracker = ProgressTracker::new(&self.scan_id, self.sink.clone());
        info!(scan_id = %self.scan_id, domain = %self.domain, "Starting scan.");

        match self.drive(&mut tracker, started).await {
            Ok(document) => {
                info!(
                    scan_id = %self.scan_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Scan completed."
                );
                Ok(document)
            }
            Err(e) => {
                self.fail(&tracker, &e).await;
                Err(e)
            }
        }
    }

    async fn drive(&self, tracker: &mut ProgressTracker, started: Instant) -> Result<ResultDocument, ScanError> {
        // Every scan passes through `scanning`, even one cancelled or past its
        // deadline before the first stage.
        self.store
            .update_status(&self.scan_id, ScanStatus::Scanning, tracker.current(), None)
            .await?;
        tracker.advance(progress::INITIALIZING);
        self.checkpoint(started)?;

        let target = ProbeTarget::new(&self.scan_id, &self.domain);
        let mut results = ScanResults::new();

        for step in self.pipeline.steps() {
            for probe in &step.probes {
                self.checkpoint(started)?;
                let stage = probe.stage();
                let outcome = self.run_probe(Arc::clone(probe), &target, &results).await?;
                if let Err(e) = &outcome {
                    warn!(scan_id = %self.scan_id, %stage, error = %e, "Stage failed, continuing.");
                }
                results.record(stage, outcome);
            }

            let next = tracker.next_value(step.milestone);
            self.store
                .update_status(&self.scan_id, ScanStatus::Scanning, next, None)
                .await?;
            tracker.advance(step.milestone);
        }

        let document = build_document(&self.scan_id, &self.domain, &results);
        let encoded = encode_document(&document)?;
        self.store.save_result(&self.scan_id, &encoded).await?;
        tracker.advance(progress::COMPLETE);
        self.sink.emit_complete(&self.scan_id, &encoded);
        Ok(document)
    }

    /// Runs one probe in its own task under the probe timeout.
    ///
    /// The outer `Result` is pipeline-level; the inner one is the stage outcome.
    async fn run_probe(
        &self,
        probe: Arc<dyn Probe>,
        target: &ProbeTarget,
        results: &ScanResults,
    ) -> Result<Result<Value, ProbeError>, ScanError> {
        let stage = probe.stage();
        let snapshot = results.clone();
        let target = target.clone();
        let limit = self.probe_timeout;

        debug!(scan_id = %self.scan_id, %stage, "Running stage.");
        let mut task =
            tokio::spawn(async move { tokio::time::timeout(limit, probe.run(&target, &snapshot)).await });

        let joined = tokio::select! {
            joined = &mut task => joined,
            _ = self.cancel.cancelled() => {
                task.abort();
                return Err(ScanError::Cancelled);
            }
        };

        match joined {
            Err(join_error) => {
                let reason = if join_error.is_panic() {
                    panic_reason(join_error.into_panic())
                } else {
                    join_error.to_string()
                };
                error!(scan_id = %self.scan_id, %stage, reason = %reason, "Stage panicked.");
                Err(ScanError::ProbePanicked {
                    stage: stage.to_string(),
                    reason,
                })
            }
            Ok(Err(_elapsed)) => Ok(Err(ProbeError::Timeout(limit.as_millis() as u64))),
            Ok(Ok(Err(e))) if e.is_fatal() => {
                error!(scan_id = %self.scan_id, %stage, error = %e, "Stage hit a fatal error.");
                Err(ScanError::Probe {
                    stage: stage.to_string(),
                    source: e,
                })
            }
            Ok(Ok(outcome)) => Ok(outcome),
        }
    }

    fn checkpoint(&self, started: Instant) -> Result<(), ScanError> {
        if self.cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        if let Some(limit) = self.scan_timeout {
            if started.elapsed() >= limit {
                return Err(ScanError::TimedOut(limit.as_secs()));
            }
        }
        Ok(())
    }

    /// Records the failure. Progress stays at the last value reached.
    async fn fail(&self, tracker: &ProgressTracker, cause: &ScanError) {
        let message = cause.to_string();
        error!(scan_id = %self.scan_id, progress = tracker.current(), error = %message, "Scan failed.");

        if let Err(store_error) = self
            .store
            .update_status(&self.scan_id, ScanStatus::Failed, tracker.current(), Some(&message))
            .await
        {
            error!(scan_id = %self.scan_id, error = %store_error, "Could not record scan failure.");
        }
        tracker.report(&format!("Scan failed: {message}"));
    }
}

fn panic_reason(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
