//! Inactivity sweep: runs once at startup and on a fixed interval,
//! removing every queue whose credential record has not been touched
//! within the retention window.

use crate::storage::DocumentStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time;

/// Sweep bookkeeping exposed by `GET /api/cleanup-status`.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CleanupStatus {
    pub last_run: Option<DateTime<Utc>>,
    pub last_removed: Vec<String>,
    pub total_removed: u64,
    pub next_run: Option<DateTime<Utc>>,
}

/// Shared handle driving sweeps and tracking their status.
#[derive(Clone)]
pub struct CleanupHandle {
    store: DocumentStore,
    retention_secs: i64,
    interval_secs: u64,
    status: Arc<Mutex<CleanupStatus>>,
}

impl CleanupHandle {
    pub fn new(store: DocumentStore, retention_secs: i64, interval_secs: u64) -> Self {
        Self {
            store,
            retention_secs,
            interval_secs,
            status: Arc::new(Mutex::new(CleanupStatus::default())),
        }
    }

    /// Run one sweep now and record the outcome.
    pub fn run_once(&self) -> Result<Vec<String>, crate::error::AppError> {
        let now = Utc::now();
        let report = self
            .store
            .sweep(now, ChronoDuration::seconds(self.retention_secs))?;

        if let Ok(mut status) = self.status.lock() {
            status.last_run = Some(now);
            status.total_removed += report.removed.len() as u64;
            status.last_removed = report.removed.clone();
            status.next_run = Some(now + ChronoDuration::seconds(self.interval_secs as i64));
        }
        Ok(report.removed)
    }

    pub fn status(&self) -> CleanupStatus {
        self.status
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

/// Spawn the periodic sweep. The first tick fires immediately, so the
/// sweep also runs once at process start.
pub fn spawn_cleanup_task(handle: CleanupHandle) {
    let period = Duration::from_secs(handle.interval_secs);
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        loop {
            interval.tick().await;
            match handle.run_once() {
                Ok(removed) if removed.is_empty() => {
                    tracing::debug!("Inactivity sweep: nothing to remove")
                }
                Ok(removed) => {
                    tracing::info!("Inactivity sweep removed {} queue(s): {:?}", removed.len(), removed)
                }
                Err(e) => tracing::error!("Inactivity sweep failed: {}", e),
            }
        }
    });
}
