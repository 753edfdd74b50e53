// src/core/notify.rs

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::core::models::{CompletionEvent, ProgressEvent};

/// Receives live scan events. Emission is fire-and-forget: implementations
/// must not block and must not fail the scan.
pub trait NotificationSink: Send + Sync {
    fn emit_progress(&self, scan_id: &str, progress: u8, message: &str);

    /// `document` is the JSON-encoded result document.
    fn emit_complete(&self, scan_id: &str, document: &str);
}

/// Wire form of a sink event, tagged with its channel name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ScanEvent {
    #[serde(rename = "scan_progress")]
    Progress(ProgressEvent),
    #[serde(rename = "scan_complete")]
    Complete(CompletionEvent),
}

impl ScanEvent {
    pub fn scan_id(&self) -> &str {
        match self {
            ScanEvent::Progress(event) => &event.id,
            ScanEvent::Complete(event) => &event.id,
        }
    }
}

/// Fans events out to any number of subscribers over a tokio broadcast channel.
/// Events sent while nobody listens are dropped; slow subscribers lag.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<ScanEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.sender.subscribe()
    }

    fn send(&self, event: ScanEvent) {
        if self.sender.send(event).is_err() {
            trace!("No subscriber for scan event.");
        }
    }
}

impl NotificationSink for BroadcastSink {
    fn emit_progress(&self, scan_id: &str, progress: u8, message: &str) {
        self.send(ScanEvent::Progress(ProgressEvent {
            id: scan_id.to_string(),
            progress,
            message: message.to_string(),
        }));
    }

    fn emit_complete(&self, scan_id: &str, document: &str) {
        self.send(ScanEvent::Complete(CompletionEvent {
            id: scan_id.to_string(),
            results: document.to_string(),
        }));
    }
}
