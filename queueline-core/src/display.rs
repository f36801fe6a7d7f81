//! Display-page computations.
//!
//! The display polls the queue document on a fixed interval and derives
//! two views from it: the calling banner and, when the viewer arrived
//! through a ticket link, their own position and elapsed wait. Polling
//! stays polling here; pushing updates would change the timing the
//! scenario tests observe.

use crate::queue::QueueStore;
use crate::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Fixed re-read interval for display pages.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// One poll tick's worth of derived state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayView {
    /// Number currently invited to the counter; `None` until the first
    /// call ever ("waiting for first call").
    pub calling: Option<u64>,
    /// The viewer's own status, when they hold a ticket number.
    pub viewer: Option<ViewerStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerStatus {
    /// Called: proceed to the counter. Wait is time-of-call minus
    /// time-of-issuance; `None` when the ticket is no longer in the
    /// document (e.g. the queue was reset).
    Called { waited: Option<chrono::Duration> },
    /// Still waiting, with `ahead` tickets before this one. Wait is
    /// now minus time-of-issuance.
    Waiting {
        ahead: u64,
        waited: Option<chrono::Duration>,
    },
}

/// Read-only poller over a queue document.
pub struct DisplayReader {
    queues: QueueStore,
    queue_name: String,
    own_number: Option<u64>,
}

impl DisplayReader {
    pub fn new(queues: QueueStore, queue_name: &str, own_number: Option<u64>) -> Self {
        Self {
            queues,
            queue_name: queue_name.to_string(),
            own_number,
        }
    }

    /// Recompute the view from the current document. Prefers the
    /// mirrored copy when a mirror is configured, falling back to the
    /// local document when the server is unreachable.
    pub async fn snapshot(&self) -> Result<DisplayView> {
        let doc = match self.queues.fetch_remote(&self.queue_name).await {
            Ok(Some(remote)) => remote,
            Ok(None) => self.queues.load(&self.queue_name)?,
            Err(e) => {
                tracing::warn!("Display falling back to local state: {}", e);
                self.queues.load(&self.queue_name)?
            }
        };
        Ok(Self::view_at(&doc, self.own_number, Utc::now()))
    }

    fn view_at(
        doc: &crate::queue::QueueState,
        own_number: Option<u64>,
        now: DateTime<Utc>,
    ) -> DisplayView {
        let calling = (doc.calling > 0).then_some(doc.calling);

        let viewer = own_number.map(|own| {
            let ticket = doc.tickets.iter().find(|t| t.number == own);
            if own <= doc.calling {
                let waited = ticket
                    .map(|t| t.served_at.unwrap_or(doc.last_updated) - t.issued_at);
                ViewerStatus::Called { waited }
            } else {
                ViewerStatus::Waiting {
                    ahead: own - doc.calling,
                    waited: ticket.map(|t| now - t.issued_at),
                }
            }
        });

        DisplayView { calling, viewer }
    }
}

/// Render a wait duration using its coarsest nonzero unit pair:
/// `2d 5h`, `3h 12m`, `5m 10s`, or `42s`. Negative durations (clock
/// skew between writer and reader) render as `0s`.
pub fn format_wait(wait: chrono::Duration) -> String {
    let secs = wait.num_seconds().max(0);
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
