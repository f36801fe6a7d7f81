//! Key-value storage port.
//!
//! The original system kept everything in browser local storage; here
//! that surface is an injected capability so the core logic never
//! assumes a specific backing store. `MemoryStore` backs tests,
//! `FileStore` backs the CLI's per-user data directory.

use crate::{Result, TicketingError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// String key-value storage with whole-value overwrite semantics.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.inner
            .lock()
            .map_err(|e| TicketingError::Storage(format!("Lock error: {}", e)))
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// File-backed store: one file per key under a directory.
#[derive(Clone)]
pub struct FileStore {
    dir: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lock: Arc::new(Mutex::new(())),
        })
    }

    /// Map a store key to a flat file name. Keys are internal
    /// (`queue-auth`, `queue-state:<validated name>`) but the mapping
    /// still refuses anything that could escape the directory.
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
        {
            return Err(TicketingError::Storage(format!(
                "Invalid store key: {:?}",
                key
            )));
        }
        Ok(self.dir.join(format!("{}.json", key.replace(':', "__"))))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        let _guard = self
            .lock
            .lock()
            .map_err(|e| TicketingError::Storage(format!("Lock error: {}", e)))?;
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let _guard = self
            .lock
            .lock()
            .map_err(|e| TicketingError::Storage(format!("Lock error: {}", e)))?;
        std::fs::write(&path, value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let _guard = self
            .lock
            .lock()
            .map_err(|e| TicketingError::Storage(format!("Lock error: {}", e)))?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("queue-auth").unwrap(), None);

        store.set("queue-auth", "{\"a\":1}").unwrap();
        assert_eq!(store.get("queue-auth").unwrap().as_deref(), Some("{\"a\":1}"));

        store.delete("queue-auth").unwrap();
        assert_eq!(store.get("queue-auth").unwrap(), None);
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store.set("queue-state:Clinic-A", "{}").unwrap();
        assert_eq!(
            store.get("queue-state:Clinic-A").unwrap().as_deref(),
            Some("{}")
        );
        assert!(dir.path().join("queue-state__Clinic-A.json").exists());

        store.delete("queue-state:Clinic-A").unwrap();
        assert_eq!(store.get("queue-state:Clinic-A").unwrap(), None);
        // Deleting again is not an error
        store.delete("queue-state:Clinic-A").unwrap();
    }

    #[test]
    fn file_store_rejects_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.get("../etc/passwd").is_err());
        assert!(store.set("a/b", "x").is_err());
        assert!(store.get("").is_err());
    }
}
