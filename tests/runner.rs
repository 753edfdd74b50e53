// tests/runner.rs

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::Semaphore;

use common::{memory_store, pipeline_with, wait_for_status, EchoSubdomainProbe, GateProbe, RecordingSink, SlowProbe};
use vanguard_recon::config::ScanSettings;
use vanguard_recon::core::models::{ScanStatus, Stage};
use vanguard_recon::core::runner::ScanRunner;
use vanguard_recon::core::store::{ScanStore, SqliteStore};
use vanguard_recon::error::ScanError;

fn settings(max_concurrent_scans: usize) -> ScanSettings {
    ScanSettings {
        max_concurrent_scans,
        scan_timeout_secs: 0,
        probe_timeout_secs: 30,
    }
}

#[tokio::test]
async fn concurrent_scans_keep_their_results_apart() {
    let store = Arc::new(memory_store());
    let sink = Arc::new(RecordingSink::default());
    let runner = ScanRunner::new(
        store.clone(),
        sink.clone(),
        pipeline_with(vec![Arc::new(EchoSubdomainProbe)]),
        settings(5),
    );

    let first = runner.submit("example.com").await.unwrap();
    let second = runner.submit("example.org").await.unwrap();
    let (first_id, second_id) = (first.scan_id().to_string(), second.scan_id().to_string());
    assert_ne!(first_id, second_id);

    let (a, b) = tokio::join!(first.wait(), second.wait());
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.domain, "example.com");
    assert_eq!(a.summary.subdomains, vec!["www.example.com"]);
    assert_eq!(b.domain, "example.org");
    assert_eq!(b.summary.subdomains, vec!["www.example.org"]);

    for (id, domain) in [(&first_id, "example.com"), (&second_id, "example.org")] {
        let scan = store.get_scan(id).await.unwrap();
        assert_eq!(scan.domain, domain);
        assert_eq!(scan.status, ScanStatus::Completed);
        assert_eq!(scan.progress, 100);

        let document = store.get_result(id).await.unwrap().unwrap().document().unwrap();
        assert_eq!(&document.scan_id, id);
        assert_eq!(document.results["subdomains"], json!([format!("www.{domain}")]));

        let progress = sink.progress_for(id);
        assert_eq!(progress.last(), Some(&100));
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(sink.completions_for(id).len(), 1);
    }
}

#[tokio::test]
async fn extra_scans_wait_for_a_free_slot() {
    let store = Arc::new(memory_store());
    let gate = Arc::new(Semaphore::new(0));
    let runner = ScanRunner::new(
        store.clone(),
        Arc::new(RecordingSink::default()),
        pipeline_with(vec![Arc::new(GateProbe {
            stage: Stage::Network,
            gate: gate.clone(),
        })]),
        settings(1),
    );

    let first = runner.submit("example.com").await.unwrap();
    let second = runner.submit("example.org").await.unwrap();
    let ids = [first.scan_id().to_string(), second.scan_id().to_string()];

    // Whichever scan got the slot is blocked on the gate; the other must still be queued.
    let mut running = None;
    for _ in 0..200 {
        for (index, id) in ids.iter().enumerate() {
            if store.get_scan(id).await.unwrap().status == ScanStatus::Scanning {
                running = Some(index);
            }
        }
        if running.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let running = running.expect("no scan started");
    tokio::time::sleep(Duration::from_millis(50)).await;
    let queued = store.get_scan(&ids[1 - running]).await.unwrap();
    assert_eq!(queued.status, ScanStatus::Pending);
    assert_eq!(queued.progress, 0);

    gate.add_permits(2);
    first.wait().await.unwrap();
    second.wait().await.unwrap();
    for id in &ids {
        assert_eq!(store.get_scan(id).await.unwrap().status, ScanStatus::Completed);
    }
}

#[tokio::test]
async fn cancelled_scan_is_recorded_as_failed() {
    let store = Arc::new(memory_store());
    let runner = ScanRunner::new(
        store.clone(),
        Arc::new(RecordingSink::default()),
        pipeline_with(vec![Arc::new(SlowProbe {
            stage: Stage::Subdomains,
            delay: Duration::from_secs(30),
        })]),
        settings(2),
    );

    let handle = runner.submit("example.com").await.unwrap();
    let scan_id = handle.scan_id().to_string();
    assert!(wait_for_status(store.as_ref(), &scan_id, ScanStatus::Scanning).await);
    assert!(!handle.is_finished());
    handle.cancel();

    let err = handle.wait().await.unwrap_err();
    assert!(matches!(err, ScanError::Cancelled));

    let scan = store.get_scan(&scan_id).await.unwrap();
    assert_eq!(scan.status, ScanStatus::Failed);
    assert_eq!(scan.error_message.as_deref(), Some("Scan cancelled"));
    assert!(store.get_result(&scan_id).await.unwrap().is_none());
}

#[tokio::test]
async fn scan_cancelled_while_queued_never_starts() {
    let store = Arc::new(memory_store());
    let gate = Arc::new(Semaphore::new(0));
    let runner = ScanRunner::new(
        store.clone(),
        Arc::new(RecordingSink::default()),
        pipeline_with(vec![Arc::new(GateProbe {
            stage: Stage::Dns,
            gate: gate.clone(),
        })]),
        settings(1),
    );

    let blocker = runner.submit("example.com").await.unwrap();
    assert!(wait_for_status(store.as_ref(), blocker.scan_id(), ScanStatus::Scanning).await);

    let queued = runner.submit("example.org").await.unwrap();
    let queued_id = queued.scan_id().to_string();
    queued.cancel();
    assert!(matches!(queued.wait().await, Err(ScanError::Cancelled)));

    let scan = store.get_scan(&queued_id).await.unwrap();
    assert_eq!(scan.status, ScanStatus::Failed);
    assert_eq!(scan.progress, 0);
    assert_eq!(
        store.writes_for(&queued_id).iter().map(|(s, _)| *s).collect::<Vec<_>>(),
        vec![ScanStatus::Pending, ScanStatus::Scanning, ScanStatus::Failed]
    );

    gate.add_permits(1);
    blocker.wait().await.unwrap();
}

#[tokio::test]
async fn shutdown_records_failure_before_returning() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scans.db");
    let store: Arc<dyn ScanStore> = Arc::new(SqliteStore::open(&path).unwrap());
    let runner = ScanRunner::new(
        store.clone(),
        Arc::new(RecordingSink::default()),
        pipeline_with(vec![Arc::new(SlowProbe {
            stage: Stage::OpenPorts,
            delay: Duration::from_secs(30),
        })]),
        settings(1),
    );

    let handle = runner.submit("example.com").await.unwrap();
    let scan_id = handle.scan_id().to_string();
    assert!(wait_for_status(store.as_ref(), &scan_id, ScanStatus::Scanning).await);

    let err = handle.shutdown().await.unwrap_err();
    assert!(matches!(err, ScanError::Cancelled));

    // Read back through a fresh connection, as the next run of the host would.
    let reopened = SqliteStore::open(&path).unwrap();
    let scan = reopened.get_scan(&scan_id).await.unwrap();
    assert_eq!(scan.status, ScanStatus::Failed);
    assert_eq!(scan.error_message.as_deref(), Some("Scan cancelled"));
}

#[tokio::test]
async fn shutdown_keeps_a_finished_result() {
    let store = Arc::new(memory_store());
    let runner = ScanRunner::new(
        store.clone(),
        Arc::new(RecordingSink::default()),
        pipeline_with(vec![]),
        settings(1),
    );

    let handle = runner.submit("example.com").await.unwrap();
    let scan_id = handle.scan_id().to_string();
    assert!(wait_for_status(store.as_ref(), &scan_id, ScanStatus::Completed).await);

    let document = handle.shutdown().await.unwrap();
    assert_eq!(document.scan_id, scan_id);
    assert_eq!(store.get_scan(&scan_id).await.unwrap().status, ScanStatus::Completed);
}
