// src/core/runner.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ScanSettings;
use crate::core::coordinator::ScanCoordinator;
use crate::core::models::{ResultDocument, Scan};
use crate::core::notify::NotificationSink;
use crate::core::pipeline::Pipeline;
use crate::core::store::ScanStore;
use crate::error::ScanError;

/// Starts scans as background tasks, at most `max_concurrent_scans` at a time.
/// Extra scans stay `pending` until a slot frees up.
pub struct ScanRunner {
    store: Arc<dyn ScanStore>,
    sink: Arc<dyn NotificationSink>,
    pipeline: Pipeline,
    permits: Arc<Semaphore>,
    settings: ScanSettings,
}

impl ScanRunner {
    pub fn new(
        store: Arc<dyn ScanStore>,
        sink: Arc<dyn NotificationSink>,
        pipeline: Pipeline,
        settings: ScanSettings,
    ) -> Self {
        Self {
            store,
            sink,
            pipeline,
            permits: Arc::new(Semaphore::new(settings.max_concurrent_scans.max(1))),
            settings,
        }
    }

    pub fn store(&self) -> Arc<dyn ScanStore> {
        Arc::clone(&self.store)
    }

    /// Creates a `pending` scan for `domain` and starts it in the background.
    pub async fn submit(&self, domain: &str) -> Result<ScanHandle, ScanError> {
        let scan = self.store.create_scan(domain).await?;
        info!(scan_id = %scan.id, domain, "Scan submitted.");
        Ok(self.spawn(scan))
    }

    /// Starts an already-created scan.
    pub fn spawn(&self, scan: Scan) -> ScanHandle {
        let cancel = CancellationToken::new();
        let scan_timeout = match self.settings.scan_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let coordinator = ScanCoordinator::new(
            &scan.id,
            &scan.domain,
            Arc::clone(&self.store),
            Arc::clone(&self.sink),
            self.pipeline.clone(),
        )
        .with_cancellation(cancel.clone())
        .with_scan_timeout(scan_timeout)
        .with_probe_timeout(Duration::from_secs(self.settings.probe_timeout_secs));

        let permits = Arc::clone(&self.permits);
        let token = cancel.clone();
        let scan_id = scan.id.clone();
        let join = tokio::spawn(async move {
            // A scan cancelled while queued still runs the coordinator, which
            // records it as failed without starting any stage.
            let _permit = tokio::select! {
                permit = permits.acquire_owned() => permit.ok(),
                _ = token.cancelled() => None,
            };
            debug!(scan_id = %scan_id, "Scan slot acquired.");
            coordinator.run().await
        });

        ScanHandle {
            scan_id: scan.id,
            cancel,
            join,
        }
    }
}

/// A running scan.
pub struct ScanHandle {
    scan_id: String,
    cancel: CancellationToken,
    join: JoinHandle<Result<ResultDocument, ScanError>>,
}

impl ScanHandle {
    pub fn scan_id(&self) -> &str {
        &self.scan_id
    }

    /// Asks the scan to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancels the scan and waits until its failure has been recorded.
    /// A scan that already finished keeps its outcome.
    pub async fn shutdown(self) -> Result<ResultDocument, ScanError> {
        self.cancel();
        self.wait().await
    }

    /// Waits for the scan to end and returns its outcome.
    pub async fn wait(self) -> Result<ResultDocument, ScanError> {
        self.join
            .await
            .map_err(|e| ScanError::Aborted(e.to_string()))?
    }
}
