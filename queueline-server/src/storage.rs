//! Flat-file document storage.
//!
//! The credential collection lives in `<data>/queue-auth.json`; each
//! queue's state document in `<data>/backups/<queue>.json`. Everything
//! is written pretty-printed, whole-file overwrite, last writer wins.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use queueline_core::{validate_queue_name, CredentialCollection, QueueState};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const AUTH_FILE: &str = "queue-auth.json";

/// Names of queues removed by one sweep pass.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub removed: Vec<String>,
}

/// Thread-safe document store over a data directory.
#[derive(Clone)]
pub struct DocumentStore {
    data_dir: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl DocumentStore {
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(data_dir.join("backups"))?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn auth_path(&self) -> PathBuf {
        self.data_dir.join(AUTH_FILE)
    }

    fn backup_path(&self, queue_name: &str) -> Result<PathBuf, AppError> {
        validate_queue_name(queue_name).map_err(|e| AppError::BadRequest(e.to_string()))?;
        Ok(self
            .data_dir
            .join("backups")
            .join(format!("{}.json", queue_name)))
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>, AppError> {
        self.lock
            .lock()
            .map_err(|e| AppError::Internal(format!("Lock error: {}", e)))
    }

    /// Load the credential collection; a missing file is an empty
    /// collection.
    pub fn load_auth(&self) -> Result<CredentialCollection, AppError> {
        let _guard = self.guard()?;
        self.read_auth()
    }

    fn read_auth(&self) -> Result<CredentialCollection, AppError> {
        match std::fs::read_to_string(self.auth_path()) {
            Ok(raw) => Ok(serde_json::from_str(&raw)
                .map_err(|e| AppError::Storage(format!("Corrupt auth file: {}", e)))?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(CredentialCollection::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the whole credential collection.
    pub fn save_auth(&self, collection: &CredentialCollection) -> Result<(), AppError> {
        let _guard = self.guard()?;
        self.write_auth(collection)
    }

    fn write_auth(&self, collection: &CredentialCollection) -> Result<(), AppError> {
        let pretty = serde_json::to_string_pretty(collection)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        std::fs::write(self.auth_path(), pretty)?;
        Ok(())
    }

    /// Remove one credential record. When the collection becomes empty
    /// the file is deleted rather than rewritten as `{}`. Returns
    /// whether a record was actually removed.
    pub fn delete_queue_auth(&self, queue_name: &str) -> Result<bool, AppError> {
        let _guard = self.guard()?;
        let mut collection = self.read_auth()?;
        let removed = collection.remove(queue_name).is_some();
        if collection.is_empty() {
            remove_if_exists(&self.auth_path())?;
        } else if removed {
            self.write_auth(&collection)?;
        }
        Ok(removed)
    }

    /// Delete the entire collection file unconditionally.
    pub fn delete_auth(&self) -> Result<(), AppError> {
        let _guard = self.guard()?;
        remove_if_exists(&self.auth_path())
    }

    /// Overwrite one queue's state document.
    pub fn save_backup(&self, queue_name: &str, mut state: QueueState) -> Result<(), AppError> {
        let path = self.backup_path(queue_name)?;
        if state.queue_name.is_empty() {
            state.queue_name = queue_name.to_string();
        }
        let pretty =
            serde_json::to_string_pretty(&state).map_err(|e| AppError::Internal(e.to_string()))?;
        let _guard = self.guard()?;
        std::fs::write(path, pretty)?;
        Ok(())
    }

    pub fn load_backup(&self, queue_name: &str) -> Result<Option<QueueState>, AppError> {
        let path = self.backup_path(queue_name)?;
        let _guard = self.guard()?;
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw).map_err(|e| {
                AppError::Storage(format!("Corrupt backup file: {}", e))
            })?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete one queue's state document; a missing file means nothing
    /// to do, not a failure.
    pub fn delete_backup(&self, queue_name: &str) -> Result<(), AppError> {
        let path = self.backup_path(queue_name)?;
        let _guard = self.guard()?;
        remove_if_exists(&path)
    }

    /// Remove every queue whose `lastAccessedAt` is older than the
    /// cutoff, deleting both its credential record and its backup.
    pub fn sweep(
        &self,
        now: DateTime<Utc>,
        retention: chrono::Duration,
    ) -> Result<SweepReport, AppError> {
        let _guard = self.guard()?;
        let mut collection = self.read_auth()?;
        let cutoff = now - retention;

        let stale: Vec<String> = collection
            .iter()
            .filter(|(_, record)| record.last_accessed_at < cutoff)
            .map(|(name, _)| name.clone())
            .collect();

        for name in &stale {
            collection.remove(name);
            // Names inside the collection were validated on the way in,
            // but re-check before touching the filesystem anyway.
            if validate_queue_name(name).is_ok() {
                remove_if_exists(&self.data_dir.join("backups").join(format!("{}.json", name)))?;
            }
        }

        if collection.is_empty() {
            remove_if_exists(&self.auth_path())?;
        } else if !stale.is_empty() {
            self.write_auth(&collection)?;
        }

        Ok(SweepReport { removed: stale })
    }
}

fn remove_if_exists(path: &Path) -> Result<(), AppError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queueline_core::{verification_code, CredentialRecord};

    fn record(last_accessed: DateTime<Utc>) -> CredentialRecord {
        CredentialRecord {
            secret: "$argon2id$placeholder".to_string(),
            verification_code: verification_code("abcd1234"),
            created_at: last_accessed,
            last_accessed_at: last_accessed,
        }
    }

    #[test]
    fn auth_collection_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        assert!(store.load_auth().unwrap().is_empty());

        let mut collection = CredentialCollection::new();
        collection.insert("Clinic-A".to_string(), record(Utc::now()));
        store.save_auth(&collection).unwrap();

        let loaded = store.load_auth().unwrap();
        assert_eq!(loaded, collection);

        // Written pretty-printed
        let raw = std::fs::read_to_string(store.auth_path()).unwrap();
        assert!(raw.contains('\n'));
    }

    #[test]
    fn deleting_the_last_record_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();

        let mut collection = CredentialCollection::new();
        collection.insert("Clinic-A".to_string(), record(Utc::now()));
        collection.insert("Clinic-B".to_string(), record(Utc::now()));
        store.save_auth(&collection).unwrap();

        assert!(store.delete_queue_auth("Clinic-A").unwrap());
        assert!(store.auth_path().exists());

        assert!(store.delete_queue_auth("Clinic-B").unwrap());
        assert!(!store.auth_path().exists());

        // Removing from a missing collection is "nothing to do"
        assert!(!store.delete_queue_auth("Clinic-C").unwrap());
    }

    #[test]
    fn backup_round_trip_and_missing_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        assert!(store.load_backup("Clinic-A").unwrap().is_none());

        let state = QueueState::new("Clinic-A");
        store.save_backup("Clinic-A", state.clone()).unwrap();
        assert_eq!(store.load_backup("Clinic-A").unwrap().unwrap(), state);

        store.delete_backup("Clinic-A").unwrap();
        assert!(store.load_backup("Clinic-A").unwrap().is_none());
        // Deleting again is still success
        store.delete_backup("Clinic-A").unwrap();
    }

    #[test]
    fn backup_names_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        assert!(store.load_backup("../escape").is_err());
        assert!(store.delete_backup("a/b").is_err());
    }

    #[test]
    fn sweep_removes_only_stale_queues() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        let now = Utc::now();

        let mut collection = CredentialCollection::new();
        collection.insert(
            "Stale".to_string(),
            record(now - chrono::Duration::days(2)),
        );
        collection.insert(
            "Fresh".to_string(),
            record(now - chrono::Duration::hours(1)),
        );
        store.save_auth(&collection).unwrap();
        store.save_backup("Stale", QueueState::new("Stale")).unwrap();
        store.save_backup("Fresh", QueueState::new("Fresh")).unwrap();

        let report = store.sweep(now, chrono::Duration::days(1)).unwrap();
        assert_eq!(report.removed, vec!["Stale".to_string()]);

        let remaining = store.load_auth().unwrap();
        assert!(remaining.contains_key("Fresh"));
        assert!(!remaining.contains_key("Stale"));
        assert!(store.load_backup("Stale").unwrap().is_none());
        assert!(store.load_backup("Fresh").unwrap().is_some());
    }

    #[test]
    fn sweeping_everything_removes_the_auth_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        let now = Utc::now();

        let mut collection = CredentialCollection::new();
        collection.insert(
            "Stale".to_string(),
            record(now - chrono::Duration::days(3)),
        );
        store.save_auth(&collection).unwrap();

        let report = store.sweep(now, chrono::Duration::days(1)).unwrap();
        assert_eq!(report.removed.len(), 1);
        assert!(!store.auth_path().exists());
    }
}
