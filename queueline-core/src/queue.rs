//! Queue state documents and their storage.
//!
//! One JSON document per queue: three counters plus the ordered ticket
//! list. All writes are whole-document overwrites; the local store is
//! authoritative and a configured backup server is mirrored
//! best-effort.

use crate::backup::BackupClient;
use crate::store::KvStore;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Storage key for one queue's state document.
pub fn state_key(queue_name: &str) -> String {
    format!("queue-state:{}", queue_name)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// Millisecond-timestamp id, bumped past the previous ticket's id
    /// when two issues land in the same millisecond.
    pub id: i64,
    pub number: u64,
    pub issued_at: DateTime<Utc>,
    pub served: bool,
    /// When the ticket was called. Absent on documents written before
    /// this field existed; readers fall back to `lastUpdated`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub served_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueueState {
    /// Redundant copy of the storage key, kept for export portability.
    #[serde(default)]
    pub queue_name: String,
    /// Last ticket number handed out; monotonic, starts at 0.
    #[serde(default)]
    pub next_issued: u64,
    /// Last ticket number invited to the counter; never exceeds
    /// `nextIssued`.
    #[serde(default)]
    pub calling: u64,
    /// Count of issued-but-not-yet-called tickets (derived).
    #[serde(default)]
    pub outstanding: u64,
    #[serde(default)]
    pub tickets: Vec<Ticket>,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

impl QueueState {
    /// A zeroed document for a queue that has never issued a ticket.
    pub fn new(queue_name: &str) -> Self {
        Self {
            queue_name: queue_name.to_string(),
            next_issued: 0,
            calling: 0,
            outstanding: 0,
            tickets: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    /// Recompute `outstanding` from the ticket list.
    pub fn recount_outstanding(&mut self) {
        self.outstanding = self.tickets.iter().filter(|t| !t.served).count() as u64;
    }

    /// Append a freshly issued ticket and advance `nextIssued`.
    pub fn append_ticket(&mut self, number: u64, now: DateTime<Utc>) -> &Ticket {
        let mut id = now.timestamp_millis();
        if let Some(last) = self.tickets.last() {
            if id <= last.id {
                id = last.id + 1;
            }
        }
        self.tickets.push(Ticket {
            id,
            number,
            issued_at: now,
            served: false,
            served_at: None,
        });
        self.next_issued = number;
        self.recount_outstanding();
        self.tickets.last().expect("ticket just pushed")
    }

    /// Mark the earliest unserved ticket with this number as served and
    /// advance `calling` to it. Returns `None` -- leaving `calling`
    /// untouched -- when no such ticket exists.
    pub fn mark_called(&mut self, number: u64, now: DateTime<Utc>) -> Option<Ticket> {
        let ticket = self
            .tickets
            .iter_mut()
            .find(|t| !t.served && t.number == number)?;
        ticket.served = true;
        ticket.served_at = Some(now);
        let called = ticket.clone();
        self.calling = number;
        self.recount_outstanding();
        Some(called)
    }

    /// Zero every counter and drop all tickets, keeping the name.
    pub fn reset(&mut self) {
        *self = Self::new(&self.queue_name);
    }
}

/// Queue document persistence over an injected key-value store, with an
/// optional best-effort remote mirror.
#[derive(Clone)]
pub struct QueueStore {
    store: Arc<dyn KvStore>,
    mirror: Option<BackupClient>,
}

impl QueueStore {
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

    /// Load a queue's document, creating a zeroed one if absent. A
    /// document whose `queueName` field is missing is migrated from the
    /// storage key; an undecodable document is an error, not a blank
    /// slate.
    pub fn load(&self, queue_name: &str) -> Result<QueueState> {
        match self.store.get(&state_key(queue_name))? {
            Some(raw) => {
                let mut doc: QueueState = serde_json::from_str(&raw)?;
                if doc.queue_name.is_empty() {
                    doc.queue_name = queue_name.to_string();
                }
                Ok(doc)
            }
            None => Ok(QueueState::new(queue_name)),
        }
    }

    /// Whole-document overwrite. Refreshes `lastUpdated`, writes the
    /// local copy, then hands a snapshot to a detached task that
    /// mirrors it to the backup server. The caller never waits on the
    /// mirror; a mirror failure is logged and swallowed.
    pub async fn persist(&self, doc: &mut QueueState) -> Result<()> {
        doc.last_updated = Utc::now();
        self.store
            .set(&state_key(&doc.queue_name), &serde_json::to_string(doc)?)?;
        if let Some(mirror) = &self.mirror {
            let mirror = mirror.clone();
            let snapshot = doc.clone();
            tokio::spawn(async move {
                if let Err(e) = mirror
                    .save_queue_backup(&snapshot.queue_name, &snapshot)
                    .await
                {
                    tracing::warn!("Remote queue backup failed: {}", e);
                }
            });
        }
        Ok(())
    }

    /// Remove the document locally, then from the mirror in a detached
    /// task.
    pub async fn delete(&self, queue_name: &str) -> Result<()> {
        self.store.delete(&state_key(queue_name))?;
        if let Some(mirror) = &self.mirror {
            let mirror = mirror.clone();
            let queue_name = queue_name.to_string();
            tokio::spawn(async move {
                if let Err(e) = mirror.delete_queue_backup(&queue_name).await {
                    tracing::warn!("Remote queue backup delete failed: {}", e);
                }
            });
        }
        Ok(())
    }

    /// Fetch the mirrored copy, if a mirror is configured and has one.
    pub async fn fetch_remote(&self, queue_name: &str) -> Result<Option<QueueState>> {
        match &self.mirror {
            Some(mirror) => mirror.get_queue_backup(queue_name).await,
            None => Ok(None),
        }
    }
}
