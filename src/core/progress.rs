// src/core/progress.rs

use std::sync::Arc;

use tracing::debug;

use crate::core::notify::NotificationSink;

/// A point on the fixed progress schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milestone {
    pub progress: u8,
    pub message: &'static str,
}

impl Milestone {
    pub const fn new(progress: u8, message: &'static str) -> Self {
        Self { progress, message }
    }
}

pub const INITIALIZING: Milestone = Milestone::new(0, "Initializing scan...");
pub const DNS_WHOIS: Milestone = Milestone::new(10, "Performing DNS and WHOIS lookup...");
pub const TLS: Milestone = Milestone::new(20, "Analyzing SSL/TLS configuration...");
pub const FINGERPRINT: Milestone = Milestone::new(30, "Fingerprinting technologies...");
pub const NETWORK: Milestone = Milestone::new(40, "Scanning network and ports...");
pub const SUBDOMAINS: Milestone = Milestone::new(50, "Enumerating subdomains...");
pub const ENDPOINTS: Milestone = Milestone::new(70, "Discovering API endpoints...");
pub const VULNERABILITIES: Milestone = Milestone::new(80, "Scanning for vulnerabilities...");
pub const MISCONFIGS: Milestone = Milestone::new(90, "Checking security configurations...");
pub const COMPLETE: Milestone = Milestone::new(100, "Scan complete!");

/// Tracks one scan's progress. The value only moves forward and never exceeds 100.
pub struct ProgressTracker {
    scan_id: String,
    current: u8,
    sink: Arc<dyn NotificationSink>,
}

impl ProgressTracker {
    pub fn new(scan_id: &str, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            scan_id: scan_id.to_string(),
            current: 0,
            sink,
        }
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    /// The value `advance(milestone)` would store, without storing it.
    pub fn next_value(&self, milestone: Milestone) -> u8 {
        self.current.max(milestone.progress.min(100))
    }

    /// Moves to `milestone` (never backwards) and emits a progress event with
    /// the resulting value.
    pub fn advance(&mut self, milestone: Milestone) -> u8 {
        self.current = self.next_value(milestone);
        debug!(scan_id = %self.scan_id, progress = self.current, message = milestone.message, "Progress advanced.");
        self.sink
            .emit_progress(&self.scan_id, self.current, milestone.message);
        self.current
    }

    /// Emits an event at the current value without moving it.
    pub fn report(&self, message: &str) {
        self.sink.emit_progress(&self.scan_id, self.current, message);
    }
}
