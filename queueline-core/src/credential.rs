//! Credential records and the credential collection.
//!
//! One record per queue name, stored as a single JSON map under the
//! `queue-auth` key. Absence of a record means the name is unclaimed
//! and will be auto-created on first login. No locking: last writer
//! wins, including racing first logins for the same unclaimed name.

use crate::backup::BackupClient;
use crate::store::KvStore;
use crate::{Result, TicketingError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Storage key for the whole credential collection.
pub const AUTH_KEY: &str = "queue-auth";

const MAX_QUEUE_NAME_LEN: usize = 50;
const MIN_PASSWORD_LEN: usize = 4;
const MAX_PASSWORD_LEN: usize = 64;

/// Credential material for one queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    /// Stored secret; format is classified by [`crate::password::classify`].
    pub secret: String,
    /// Fast non-cryptographic digest of the plaintext, 8 hex digits.
    pub verification_code: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

/// The whole collection, keyed by queue name. `BTreeMap` keeps the
/// serialized file stable across rewrites.
pub type CredentialCollection = BTreeMap<String, CredentialRecord>;

/// Fast non-cryptographic digest (djb2) of a plaintext password,
/// rendered as 8 hex digits. Used for legacy matching and the
/// distributor hand-off token; never a substitute for the hash.
pub fn verification_code(plaintext: &str) -> String {
    let mut h: u32 = 5381;
    for b in plaintext.bytes() {
        h = h.wrapping_mul(33).wrapping_add(u32::from(b));
    }
    format!("{:08x}", h)
}

/// Queue names: 1-50 chars of `[A-Za-z0-9_-]`. Checked before any
/// storage or network call.
pub fn validate_queue_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_QUEUE_NAME_LEN {
        return Err(TicketingError::Validation(format!(
            "Queue name must be 1-{} characters",
            MAX_QUEUE_NAME_LEN
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
    {
        return Err(TicketingError::Validation(
            "Queue name may only contain letters, digits, '-' and '_'".to_string(),
        ));
    }
    Ok(())
}

/// Passwords: 4-64 alphanumeric chars.
pub fn validate_password(password: &str) -> Result<()> {
    if password.len() < MIN_PASSWORD_LEN || password.len() > MAX_PASSWORD_LEN {
        return Err(TicketingError::Validation(format!(
            "Password must be {}-{} characters",
            MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
        )));
    }
    if !password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(TicketingError::Validation(
            "Password may only contain letters and digits".to_string(),
        ));
    }
    Ok(())
}

/// Credential collection operations over an injected key-value store,
/// mirrored best-effort to the backup server when one is configured.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KvStore>,
    mirror: Option<BackupClient>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            mirror: None,
        }
    }

    pub fn with_mirror(store: Arc<dyn KvStore>, mirror: BackupClient) -> Self {
        Self {
            store,
            mirror: Some(mirror),
        }
    }

    /// Load the whole collection; absent key means no queues exist yet.
    pub fn load(&self) -> Result<CredentialCollection> {
        match self.store.get(AUTH_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(CredentialCollection::new()),
        }
    }

    pub fn lookup(&self, queue_name: &str) -> Result<Option<CredentialRecord>> {
        Ok(self.load()?.get(queue_name).cloned())
    }

    /// Idempotent whole-record replace.
    pub async fn upsert(&self, queue_name: &str, record: CredentialRecord) -> Result<()> {
        let mut collection = self.load()?;
        collection.insert(queue_name.to_string(), record);
        self.save(&collection).await
    }

    /// Remove one record. When the collection becomes empty the
    /// underlying key is deleted entirely rather than persisted as an
    /// empty shell.
    pub async fn remove(&self, queue_name: &str) -> Result<()> {
        let mut collection = self.load()?;
        collection.remove(queue_name);
        if collection.is_empty() {
            self.store.delete(AUTH_KEY)?;
        } else {
            self.store.set(AUTH_KEY, &serde_json::to_string(&collection)?)?;
        }
        if let Some(mirror) = &self.mirror {
            let mirror = mirror.clone();
            let queue_name = queue_name.to_string();
            tokio::spawn(async move {
                if let Err(e) = mirror.delete_queue_auth(&queue_name).await {
                    tracing::warn!("Remote credential delete failed: {}", e);
                }
            });
        }
        Ok(())
    }

    /// Refresh `lastAccessedAt` to now; missing records are left alone.
    pub async fn touch(&self, queue_name: &str) -> Result<()> {
        let mut collection = self.load()?;
        if let Some(record) = collection.get_mut(queue_name) {
            record.last_accessed_at = Utc::now();
            self.save(&collection).await?;
        }
        Ok(())
    }

    async fn save(&self, collection: &CredentialCollection) -> Result<()> {
        self.store.set(AUTH_KEY, &serde_json::to_string(collection)?)?;
        // Best-effort detached mirror; the local copy stays
        // authoritative and the caller never waits on the remote.
        if let Some(mirror) = &self.mirror {
            let mirror = mirror.clone();
            let snapshot = collection.clone();
            tokio::spawn(async move {
                if let Err(e) = mirror.save_auth(&snapshot).await {
                    tracing::warn!("Remote credential save failed: {}", e);
                }
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn record(secret: &str, plaintext: &str) -> CredentialRecord {
        let now = Utc::now();
        CredentialRecord {
            secret: secret.to_string(),
            verification_code: verification_code(plaintext),
            created_at: now,
            last_accessed_at: now,
        }
    }

    #[test]
    fn verification_code_is_stable_hex() {
        let code = verification_code("abcd1234");
        assert_eq!(code.len(), 8);
        assert_eq!(code, verification_code("abcd1234"));
        assert_ne!(code, verification_code("abcd1235"));
        assert!(code.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn queue_name_validation() {
        assert!(validate_queue_name("Clinic-A").is_ok());
        assert!(validate_queue_name("front_desk_2").is_ok());
        assert!(validate_queue_name("").is_err());
        assert!(validate_queue_name("no spaces").is_err());
        assert!(validate_queue_name(&"x".repeat(51)).is_err());
    }

    #[test]
    fn password_validation() {
        assert!(validate_password("abcd1234").is_ok());
        assert!(validate_password("abc").is_err());
        assert!(validate_password("pass word").is_err());
        assert!(validate_password(&"a".repeat(65)).is_err());
    }

    #[tokio::test]
    async fn upsert_lookup_touch() {
        let store = CredentialStore::new(Arc::new(MemoryStore::new()));
        assert!(store.lookup("Clinic-A").unwrap().is_none());

        store
            .upsert("Clinic-A", record("$argon2id$fake", "abcd1234"))
            .await
            .unwrap();
        let before = store.lookup("Clinic-A").unwrap().unwrap();

        store.touch("Clinic-A").await.unwrap();
        let after = store.lookup("Clinic-A").unwrap().unwrap();
        assert!(after.last_accessed_at >= before.last_accessed_at);

        // Touching an unknown name is a no-op
        store.touch("Clinic-B").await.unwrap();
        assert!(store.lookup("Clinic-B").unwrap().is_none());
    }

    #[tokio::test]
    async fn save_does_not_wait_on_a_stalled_mirror() {
        // Accepts connections but never answers; an inline mirror
        // write would block on it until the client timeout.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let _hold = socket;
                    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                });
            }
        });

        let kv = Arc::new(MemoryStore::new());
        let mirror = BackupClient::new(&format!("http://{}", addr)).unwrap();
        let store = CredentialStore::with_mirror(kv.clone(), mirror);

        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            store.upsert("Clinic-A", record("$argon2id$fake", "abcd1234")),
        )
        .await
        .expect("local write returned without waiting on the mirror")
        .unwrap();
        assert!(kv.get(AUTH_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn removing_last_record_deletes_the_collection_key() {
        let kv = Arc::new(MemoryStore::new());
        let store = CredentialStore::new(kv.clone());

        store
            .upsert("Clinic-A", record("secret", "abcd1234"))
            .await
            .unwrap();
        store
            .upsert("Clinic-B", record("secret", "abcd1234"))
            .await
            .unwrap();

        store.remove("Clinic-A").await.unwrap();
        assert!(kv.get(AUTH_KEY).unwrap().is_some());

        store.remove("Clinic-B").await.unwrap();
        // No empty `{}` shell left behind
        assert!(kv.get(AUTH_KEY).unwrap().is_none());
    }
}
