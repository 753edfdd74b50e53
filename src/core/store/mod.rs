// src/core/store/mod.rs

//! Persistence of scans and their results.
//!
//! Both backends enforce the same rules through [`apply_status_update`]:
//! no transition out of a terminal state, progress stored as
//! `max(stored, new)`, and a result row only alongside the move to
//! `completed`.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::Utc;

use crate::core::models::{Scan, ScanResult, ScanStatus};
use crate::error::StoreError;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Registers a new `pending` scan for `domain`.
    async fn create_scan(&self, domain: &str) -> Result<Scan, StoreError>;

    async fn get_scan(&self, scan_id: &str) -> Result<Scan, StoreError>;

    /// The stored result, `None` until the scan has completed.
    async fn get_result(&self, scan_id: &str) -> Result<Option<ScanResult>, StoreError>;

    /// Updates status and progress in one write. `error_message` is only
    /// kept when moving to `failed`.
    async fn update_status(
        &self,
        scan_id: &str,
        status: ScanStatus,
        progress: u8,
        error_message: Option<&str>,
    ) -> Result<Scan, StoreError>;

    /// Stores the encoded result document and moves the scan to `completed`
    /// at 100 in the same write. Fails if a result already exists.
    async fn save_result(&self, scan_id: &str, document: &str) -> Result<ScanResult, StoreError>;
}

/// Applies a status update to an in-memory copy of a scan row.
pub fn apply_status_update(
    scan: &mut Scan,
    status: ScanStatus,
    progress: u8,
    error_message: Option<&str>,
) -> Result<(), StoreError> {
    if !scan.status.can_transition_to(status) {
        return Err(StoreError::InvalidTransition {
            scan_id: scan.id.clone(),
            from: scan.status,
            to: status,
        });
    }
    scan.status = status;
    scan.progress = scan.progress.max(progress.min(100));
    if status == ScanStatus::Failed {
        scan.error_message = error_message.map(str::to_string);
    }
    scan.updated_at = Utc::now();
    Ok(())
}
