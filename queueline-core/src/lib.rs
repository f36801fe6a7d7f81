//! Queueline Core Library
//!
//! This library provides the core functionality for the Queueline
//! ticketing system: credential storage and verification, session
//! handling, queue state management, and display-view computation.

pub mod auth;
pub mod backup;
pub mod credential;
pub mod deeplink;
pub mod display;
pub mod distributor;
pub mod password;
pub mod queue;
pub mod session;
pub mod store;

pub use auth::{AuthError, Authenticator, HandoffToken, LoginSuccess};
pub use backup::BackupClient;
pub use credential::{
    validate_password, validate_queue_name, verification_code, CredentialCollection,
    CredentialRecord, CredentialStore, AUTH_KEY,
};
pub use deeplink::{decode_link, encode_link, DisplayLink};
pub use display::{format_wait, DisplayReader, DisplayView, ViewerStatus, POLL_INTERVAL};
pub use distributor::{CallOutcome, Distributor};
pub use queue::{state_key, QueueState, QueueStore, Ticket};
pub use session::{Session, SessionError, SESSION_TTL_HOURS};
pub use store::{FileStore, KvStore, MemoryStore};

use thiserror::Error;

/// Result type for ticketing operations
pub type Result<T> = std::result::Result<T, TicketingError>;

/// General error type for ticketing operations
#[derive(Error, Debug)]
pub enum TicketingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] auth::AuthError),

    #[error(transparent)]
    Session(#[from] session::SessionError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Remote store unreachable: {0}")]
    Remote(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation already in flight")]
    Busy,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
