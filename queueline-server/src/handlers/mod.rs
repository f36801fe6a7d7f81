//! HTTP handlers.

pub mod auth;
pub mod backup;
pub mod cleanup;

use crate::cleanup::CleanupHandle;
use crate::storage::DocumentStore;

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: DocumentStore,
    pub cleanup: CleanupHandle,
}
