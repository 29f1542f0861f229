//! Error types for the watch orchestrator.

use std::path::PathBuf;
use thiserror::Error;

use crate::integration::IntegrationError;
use crate::storage::StorageError;

/// Errors from watcher operations.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("The given directory does not exist or has a non UTF-8 path: {path}")]
    InvalidFolder { path: PathBuf },

    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("Orchestrator already started")]
    AlreadyStarted,

    #[error("Orchestrator not started")]
    NotStarted,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}
