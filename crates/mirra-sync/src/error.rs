//! # Design
//!
//! - Provide structured, constant-message errors for the sync engine.
//! - Capture operation context (paths, inputs) to make failures reproducible in tests.
//! - Preserve source errors without interpolating context into error messages.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for sync engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors produced by the sync engine.
///
/// Per-file filesystem failures during linking and deletion degrade to
/// logged warnings instead of surfacing here; only watcher setup has a
/// caller that needs to distinguish failure.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Watcher attach or detach failures.
    #[error("watch failure")]
    Watch {
        /// Operation that triggered the watch failure.
        operation: &'static str,
        /// Root involved in the watch failure.
        path: PathBuf,
        /// Underlying notify error.
        source: notify::Error,
    },
}

impl SyncError {
    pub(crate) fn watch(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: notify::Error,
    ) -> Self {
        Self::Watch {
            operation,
            path: path.into(),
            source,
        }
    }
}
