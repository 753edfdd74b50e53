// src/core/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{apply_status_update, ScanStore};
use crate::core::models::{Scan, ScanResult, ScanStatus};
use crate::error::StoreError;

#[derive(Default)]
struct Inner {
    scans: HashMap<String, Scan>,
    results: HashMap<String, ScanResult>,
}

/// Process-local store. Both tables live behind one lock so a result and its
/// `completed` status become visible together.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScanStore for MemoryStore {
    async fn create_scan(&self, domain: &str) -> Result<Scan, StoreError> {
        let scan = Scan::new(domain);
        debug!(scan_id = %scan.id, domain, "Scan created.");
        self.inner
            .write()
            .await
            .scans
            .insert(scan.id.clone(), scan.clone());
        Ok(scan)
    }

    async fn get_scan(&self, scan_id: &str) -> Result<Scan, StoreError> {
        self.inner
            .read()
            .await
            .scans
            .get(scan_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(scan_id.to_string()))
    }

    async fn get_result(&self, scan_id: &str) -> Result<Option<ScanResult>, StoreError> {
        let inner = self.inner.read().await;
        if !inner.scans.contains_key(scan_id) {
            return Err(StoreError::NotFound(scan_id.to_string()));
        }
        Ok(inner.results.get(scan_id).cloned())
    }

    async fn update_status(
        &self,
        scan_id: &str,
        status: ScanStatus,
        progress: u8,
        error_message: Option<&str>,
    ) -> Result<Scan, StoreError> {
        let mut inner = self.inner.write().await;
        let scan = inner
            .scans
            .get_mut(scan_id)
            .ok_or_else(|| StoreError::NotFound(scan_id.to_string()))?;
        apply_status_update(scan, status, progress, error_message)?;
        Ok(scan.clone())
    }

    async fn save_result(&self, scan_id: &str, document: &str) -> Result<ScanResult, StoreError> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        if inner.results.contains_key(scan_id) {
            return Err(StoreError::DuplicateResult(scan_id.to_string()));
        }
        let scan = inner
            .scans
            .get_mut(scan_id)
            .ok_or_else(|| StoreError::NotFound(scan_id.to_string()))?;

        // Validate on a copy so a rejected transition leaves the row untouched.
        let mut updated = scan.clone();
        apply_status_update(&mut updated, ScanStatus::Completed, 100, None)?;
        *scan = updated;

        let result = ScanResult {
            scan_id: scan_id.to_string(),
            results: document.to_string(),
            created_at: Utc::now(),
        };
        inner.results.insert(scan_id.to_string(), result.clone());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn result_is_saved_once_with_completion() {
        let store = MemoryStore::new();
        let scan = store.create_scan("example.com").await.unwrap();
        assert_eq!(scan.status, ScanStatus::Pending);

        store
            .update_status(&scan.id, ScanStatus::Scanning, 50, None)
            .await
            .unwrap();
        store.save_result(&scan.id, "{}").await.unwrap();

        let stored = store.get_scan(&scan.id).await.unwrap();
        assert_eq!(stored.status, ScanStatus::Completed);
        assert_eq!(stored.progress, 100);
        assert!(store.get_result(&scan.id).await.unwrap().is_some());

        let err = store.save_result(&scan.id, "{}").await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateResult(_)));
    }

    #[tokio::test]
    async fn result_requires_a_running_scan() {
        let store = MemoryStore::new();
        let scan = store.create_scan("example.com").await.unwrap();

        let err = store.save_result(&scan.id, "{}").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        assert_eq!(store.get_scan(&scan.id).await.unwrap().status, ScanStatus::Pending);
        assert!(store.get_result(&scan.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_scan_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get_scan("missing").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store
                .update_status("missing", ScanStatus::Scanning, 0, None)
                .await,
            Err(StoreError::NotFound(_))
        ));
    }
}
