//! Daemon liveness record (`daemon.json`).
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation (Claude)

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{error, info};

use super::atomic;
use crate::error::Result;
use crate::types::{DaemonState, DaemonStateUpdate};

pub const DAEMON_STATE_FILE: &str = "daemon.json";

/// A daemon is presumed dead when its heartbeat is this old.
pub const HEARTBEAT_TIMEOUT: chrono::Duration = chrono::Duration::seconds(120);

#[derive(Debug, Clone)]
pub struct DaemonStateStore {
    path: PathBuf,
}

impl DaemonStateStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(DAEMON_STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record. Absent and unparsable both read as `None`.
    pub async fn load(&self) -> Result<Option<DaemonState>> {
        atomic::read_json_optional(&self.path).await
    }

    pub async fn save(&self, state: &DaemonState) -> Result<()> {
        atomic::write_json(&self.path, state).await
    }

    /// Apply a partial update. No-op when no record exists.
    pub async fn update(&self, update: DaemonStateUpdate) -> Result<bool> {
        let Some(mut state) = self.load().await? else {
            return Ok(false);
        };
        update.apply(&mut state);
        self.save(&state).await?;
        Ok(true)
    }

    /// Rewrite `lastHeartbeat`. No-op when no record exists.
    pub async fn touch_heartbeat(&self, now: DateTime<Utc>) -> Result<bool> {
        self.update(DaemonStateUpdate {
            last_heartbeat: Some(now),
            ..Default::default()
        })
        .await
    }

    /// Delete the record. A missing file is fine; other errors are logged.
    pub async fn remove(&self) {
        match atomic::remove_if_exists(&self.path).await {
            Ok(true) => info!("Removed daemon state file"),
            Ok(false) => {}
            Err(e) => error!(error = %e, "Failed to remove daemon state file"),
        }
    }

    /// Liveness test at `now`.
    ///
    /// Staleness of the heartbeat is authoritative; the recorded pid is not
    /// consulted.
    pub async fn is_running_at(&self, now: DateTime<Utc>) -> Result<bool> {
        Ok(self
            .load()
            .await?
            .map(|state| is_fresh(&state, now))
            .unwrap_or(false))
    }

    pub async fn is_running(&self) -> Result<bool> {
        self.is_running_at(Utc::now()).await
    }
}

/// True iff the heartbeat is younger than [`HEARTBEAT_TIMEOUT`].
pub fn is_fresh(state: &DaemonState, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(state.last_heartbeat) < HEARTBEAT_TIMEOUT
}
