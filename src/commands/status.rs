//! `status`: daemon liveness plus queue summary.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation (Claude)

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::output::OutputControls;
use crate::store::daemon_state::is_fresh;
use crate::store::{DaemonStateStore, MessageStore};
use crate::types::MessageStatus;

/// Daemon liveness as seen from another process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonStatus {
    Running,
    /// No state file
    Stopped,
    /// State file present but heartbeat too old
    Stale,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub daemon: DaemonStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_secs: Option<i64>,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub pending: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_due: Option<DateTime<Utc>>,
}

impl StatusReport {
    pub async fn collect(
        messages: &MessageStore,
        daemon_state: &DaemonStateStore,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let state = daemon_state.load().await.context("Failed to read daemon state")?;
        let queue = messages
            .list_pending()
            .await
            .context("Failed to load scheduled messages")?;

        let pending: Vec<_> = queue
            .iter()
            .filter(|m| m.status == MessageStatus::Pending)
            .collect();
        let failed = queue.len() - pending.len();
        let next_due = pending.iter().map(|m| m.scheduled_time).min();

        let mut report = Self {
            daemon: DaemonStatus::Stopped,
            pid: None,
            started_at: None,
            uptime_secs: None,
            connected: false,
            last_check_at: None,
            last_heartbeat: None,
            pending: pending.len(),
            failed,
            next_due,
        };

        if let Some(state) = state {
            let running = is_fresh(&state, now);
            report.daemon = if running {
                DaemonStatus::Running
            } else {
                DaemonStatus::Stale
            };
            report.pid = Some(state.pid);
            report.started_at = Some(state.started_at);
            report.uptime_secs = running.then(|| (now - state.started_at).num_seconds());
            report.connected = running && state.connected;
            report.last_check_at = Some(state.last_check_at);
            report.last_heartbeat = Some(state.last_heartbeat);
        }

        Ok(report)
    }

    pub fn print(&self, output: &OutputControls) {
        if output.json {
            output.print(self);
            return;
        }

        match self.daemon {
            DaemonStatus::Stopped => println!("Daemon: not running"),
            DaemonStatus::Stale => println!(
                "Daemon: stopped (stale state file, pid {})",
                self.pid.map(|p| p.to_string()).unwrap_or_default()
            ),
            DaemonStatus::Running => {
                println!(
                    "Daemon: running (pid {})",
                    self.pid.map(|p| p.to_string()).unwrap_or_default()
                );
                if let Some(uptime) = self.uptime_secs {
                    println!("  Uptime:         {}", format_uptime(uptime));
                }
                println!("  Connected:      {}", if self.connected { "yes" } else { "no" });
            }
        }
        if let Some(at) = self.last_check_at {
            println!("  Last check:     {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        if let Some(at) = self.last_heartbeat {
            println!("  Last heartbeat: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
        }

        println!("Queue: {} pending, {} failed", self.pending, self.failed);
        if let Some(at) = self.next_due {
            println!("  Next due:       {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
        }
    }
}

fn format_uptime(secs: i64) -> String {
    let secs = secs.max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {}m", h, m)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}

pub async fn status(
    messages: &MessageStore,
    daemon_state: &DaemonStateStore,
    output: &OutputControls,
) -> Result<()> {
    StatusReport::collect(messages, daemon_state, Utc::now())
        .await?
        .print(output);
    Ok(())
}
