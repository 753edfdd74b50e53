// src/core/store/sqlite.rs

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::{apply_status_update, ScanStore};
use crate::core::models::{Scan, ScanResult, ScanStatus};
use crate::error::StoreError;

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS scans (
        id            TEXT PRIMARY KEY,
        domain        TEXT NOT NULL,
        status        TEXT NOT NULL,
        progress      INTEGER NOT NULL DEFAULT 0,
        updated_at    TEXT NOT NULL,
        error_message TEXT
    );

    CREATE TABLE IF NOT EXISTS scan_results (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        scan_id    TEXT NOT NULL UNIQUE REFERENCES scans(id),
        results    TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
"#;

/// SQLite-backed store. Queries run on the blocking pool; one connection is
/// shared behind a mutex, so writes are serialized.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the database file at `path` and applies the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening scan database.");
        Self::with_schema(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_schema(Connection::open_in_memory()?)
    }

    fn with_schema(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_connection<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Task("database lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn conversion_error<E>(index: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
}

fn parse_timestamp(index: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(index, e))
}

fn scan_from_row(row: &Row<'_>) -> rusqlite::Result<Scan> {
    let status: String = row.get(2)?;
    let updated_at: String = row.get(4)?;
    Ok(Scan {
        id: row.get(0)?,
        domain: row.get(1)?,
        status: ScanStatus::from_str(&status).map_err(|e| conversion_error(2, e))?,
        progress: row.get(3)?,
        updated_at: parse_timestamp(4, &updated_at)?,
        error_message: row.get(5)?,
    })
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<ScanResult> {
    let created_at: String = row.get(2)?;
    Ok(ScanResult {
        scan_id: row.get(0)?,
        results: row.get(1)?,
        created_at: parse_timestamp(2, &created_at)?,
    })
}

fn load_scan(conn: &Connection, scan_id: &str) -> Result<Scan, StoreError> {
    conn.query_row(
        "SELECT id, domain, status, progress, updated_at, error_message FROM scans WHERE id = ?1",
        params![scan_id],
        scan_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(scan_id.to_string()))
}

fn write_scan(conn: &Connection, scan: &Scan) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE scans SET status = ?1, progress = ?2, updated_at = ?3, error_message = ?4 WHERE id = ?5",
        params![
            scan.status.to_string(),
            scan.progress,
            scan.updated_at.to_rfc3339(),
            scan.error_message,
            scan.id,
        ],
    )?;
    Ok(())
}

#[async_trait]
impl ScanStore for SqliteStore {
    async fn create_scan(&self, domain: &str) -> Result<Scan, StoreError> {
        let scan = Scan::new(domain);
        let row = scan.clone();
        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO scans (id, domain, status, progress, updated_at, error_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    row.id,
                    row.domain,
                    row.status.to_string(),
                    row.progress,
                    row.updated_at.to_rfc3339(),
                    row.error_message,
                ],
            )?;
            Ok(())
        })
        .await?;
        debug!(scan_id = %scan.id, domain, "Scan created.");
        Ok(scan)
    }

    async fn get_scan(&self, scan_id: &str) -> Result<Scan, StoreError> {
        let scan_id = scan_id.to_string();
        self.with_connection(move |conn| load_scan(conn, &scan_id)).await
    }

    async fn get_result(&self, scan_id: &str) -> Result<Option<ScanResult>, StoreError> {
        let scan_id = scan_id.to_string();
        self.with_connection(move |conn| {
            load_scan(conn, &scan_id)?;
            let result = conn
                .query_row(
                    "SELECT scan_id, results, created_at FROM scan_results WHERE scan_id = ?1",
                    params![scan_id],
                    result_from_row,
                )
                .optional()?;
            Ok(result)
        })
        .await
    }

    async fn update_status(
        &self,
        scan_id: &str,
        status: ScanStatus,
        progress: u8,
        error_message: Option<&str>,
    ) -> Result<Scan, StoreError> {
        let scan_id = scan_id.to_string();
        let error_message = error_message.map(str::to_string);
        self.with_connection(move |conn| {
            let tx = conn.transaction()?;
            let mut scan = load_scan(&tx, &scan_id)?;
            apply_status_update(&mut scan, status, progress, error_message.as_deref())?;
            write_scan(&tx, &scan)?;
            tx.commit()?;
            Ok(scan)
        })
        .await
    }

    async fn save_result(&self, scan_id: &str, document: &str) -> Result<ScanResult, StoreError> {
        let scan_id = scan_id.to_string();
        let document = document.to_string();
        self.with_connection(move |conn| {
            let tx = conn.transaction()?;
            let existing: i64 = tx.query_row(
                "SELECT COUNT(*) FROM scan_results WHERE scan_id = ?1",
                params![scan_id],
                |row| row.get(0),
            )?;
            if existing > 0 {
                return Err(StoreError::DuplicateResult(scan_id));
            }

            let mut scan = load_scan(&tx, &scan_id)?;
            apply_status_update(&mut scan, ScanStatus::Completed, 100, None)?;
            write_scan(&tx, &scan)?;

            let result = ScanResult {
                scan_id,
                results: document,
                created_at: Utc::now(),
            };
            tx.execute(
                "INSERT INTO scan_results (scan_id, results, created_at) VALUES (?1, ?2, ?3)",
                params![result.scan_id, result.results, result.created_at.to_rfc3339()],
            )?;
            tx.commit()?;
            Ok(result)
        })
        .await
    }
}
