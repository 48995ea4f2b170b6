//! Library error type.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation (Claude)

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the store, the daemon runtime and the collaborators.
///
/// Corruption of a persisted collection has no variant; the store recovers
/// from it and never reports it.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Message sender unavailable: {0}")]
    SenderUnavailable(String),

    #[error("Message sender failed to become ready within {0:?}")]
    StartupTimeout(std::time::Duration),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),
}

impl SchedulerError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
