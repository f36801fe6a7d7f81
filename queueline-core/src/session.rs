//! Operator sessions.
//!
//! A session is client-held and ephemeral: queue name, login time, and
//! an integrity tag derived from the queue name and the calendar day of
//! login. It expires 8 hours after login or as soon as the tag no
//! longer matches a recomputation (e.g. a hand-edited session file).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Sessions expire this many hours after login.
pub const SESSION_TTL_HOURS: i64 = 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session integrity tag mismatch")]
    TagMismatch,
    #[error("Session expired")]
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub queue_name: String,
    pub logged_in_at: DateTime<Utc>,
    pub tag: String,
}

/// Integrity tag: hex SHA-256 over queue name + calendar day.
pub fn integrity_tag(queue_name: &str, day: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(queue_name.as_bytes());
    hasher.update(day.as_bytes());
    hex::encode(hasher.finalize())
}

impl Session {
    /// Start a session now.
    pub fn start(queue_name: &str) -> Self {
        Self::started_at(queue_name, Utc::now())
    }

    /// Start a session at a given instant (tests need a movable clock).
    pub fn started_at(queue_name: &str, at: DateTime<Utc>) -> Self {
        let day = at.format("%Y-%m-%d").to_string();
        Self {
            queue_name: queue_name.to_string(),
            logged_in_at: at,
            tag: integrity_tag(queue_name, &day),
        }
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        self.validate_at(Utc::now())
    }

    /// Reject on tag mismatch first, then on the 8-hour window. The tag
    /// is recomputed from the stored queue name and the stored login
    /// day, so any edit to either field invalidates the session.
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<(), SessionError> {
        let day = self.logged_in_at.format("%Y-%m-%d").to_string();
        if integrity_tag(&self.queue_name, &day) != self.tag {
            return Err(SessionError::TagMismatch);
        }
        if now - self.logged_in_at > chrono::Duration::hours(SESSION_TTL_HOURS) {
            return Err(SessionError::Expired);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn fresh_session_is_valid() {
        let session = Session::start("Clinic-A");
        assert!(session.validate().is_ok());
    }

    #[test]
    fn session_expires_after_eight_hours() {
        let start = Utc::now();
        let session = Session::started_at("Clinic-A", start);
        assert!(session.validate_at(start + Duration::hours(7)).is_ok());
        assert_eq!(
            session.validate_at(start + Duration::hours(9)),
            Err(SessionError::Expired)
        );
    }

    #[test]
    fn tampered_queue_name_fails_tag_check() {
        let mut session = Session::start("Clinic-A");
        session.queue_name = "Clinic-B".to_string();
        assert_eq!(session.validate(), Err(SessionError::TagMismatch));
    }

    #[test]
    fn tampered_login_time_fails_tag_check() {
        let start = Utc::now();
        let mut session = Session::started_at("Clinic-A", start);
        // Moving the login time to another day breaks the day-bound tag
        // before the expiry check even runs.
        session.logged_in_at = start - Duration::days(2);
        assert_eq!(
            session.validate_at(start),
            Err(SessionError::TagMismatch)
        );
    }
}
