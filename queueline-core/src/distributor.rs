//! Distributor controller: issues tickets and advances the calling
//! pointer for one queue.
//!
//! The three counters always satisfy `0 <= calling <= nextIssued`, and
//! `outstanding = nextIssued - calling` as long as no ticket is
//! skipped. Two distributor processes on the same queue are not
//! coordinated: concurrent `call_next` invocations can double-advance
//! `calling` past a skipped ticket, exactly as the original system
//! behaved.

use crate::credential::CredentialStore;
use crate::queue::{QueueState, QueueStore, Ticket};
use crate::{Result, TicketingError};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Outcome of a `call_next` attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// A ticket was invited to the counter.
    Called(Ticket),
    /// Nothing left to call; shown to the operator as a notice.
    NothingToCall,
    /// The expected ticket was missing from the persisted document;
    /// in-memory and persisted state may diverge until the next reload.
    Diverged { expected: u64 },
}

/// Per-queue controller for the distributor page.
pub struct Distributor {
    queue_name: String,
    queues: QueueStore,
    credentials: CredentialStore,
    /// Re-entrancy guard for issuance (the UI-level debounce).
    issuing: Arc<AtomicBool>,
}

impl Distributor {
    pub fn new(queue_name: &str, queues: QueueStore, credentials: CredentialStore) -> Self {
        Self {
            queue_name: queue_name.to_string(),
            queues,
            credentials,
            issuing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current state of this queue.
    pub fn state(&self) -> Result<QueueState> {
        self.queues.load(&self.queue_name)
    }

    /// Issue the next ticket number. A second call while one is in
    /// flight fails with `Busy` instead of double-issuing.
    pub async fn issue_next(&self) -> Result<Ticket> {
        if self.issuing.swap(true, Ordering::SeqCst) {
            return Err(TicketingError::Busy);
        }
        let result = self.issue_inner().await;
        self.issuing.store(false, Ordering::SeqCst);
        result
    }

    async fn issue_inner(&self) -> Result<Ticket> {
        let mut doc = self.queues.load(&self.queue_name)?;
        let number = doc.next_issued + 1;
        doc.append_ticket(number, Utc::now());
        self.queues.persist(&mut doc).await?;

        // Reload to confirm the write landed before handing the ticket
        // to the operator.
        let confirmed = self.queues.load(&self.queue_name)?;
        confirmed
            .tickets
            .iter()
            .find(|t| t.number == number)
            .cloned()
            .ok_or_else(|| {
                TicketingError::Storage(format!("Issued ticket {} did not persist", number))
            })
    }

    /// Invite the next ticket to the counter.
    pub async fn call_next(&self) -> Result<CallOutcome> {
        let mut doc = self.queues.load(&self.queue_name)?;
        if doc.calling >= doc.next_issued {
            return Ok(CallOutcome::NothingToCall);
        }

        let target = doc.calling + 1;
        match doc.mark_called(target, Utc::now()) {
            Some(ticket) => {
                self.queues.persist(&mut doc).await?;
                Ok(CallOutcome::Called(ticket))
            }
            None => {
                tracing::warn!(
                    queue = %self.queue_name,
                    expected = target,
                    "Expected ticket missing while calling; state may diverge until reload"
                );
                Ok(CallOutcome::Diverged { expected: target })
            }
        }
    }

    /// Zero all counters and tickets. Operator confirmation is the
    /// caller's responsibility.
    pub async fn reset_all(&self) -> Result<()> {
        let mut doc = self.queues.load(&self.queue_name)?;
        doc.reset();
        self.queues.persist(&mut doc).await
    }

    /// Delete this queue: its state document and its credential record
    /// (not the whole collection). The caller clears its session and
    /// returns to login.
    pub async fn delete_queue(&self) -> Result<()> {
        self.queues.delete(&self.queue_name).await?;
        self.credentials.remove(&self.queue_name).await?;
        Ok(())
    }
}
