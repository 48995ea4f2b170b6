//! Persisted record types: queue entries, sent history, daemon liveness.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation (Claude)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of an entry in the pending queue.
///
/// Successful delivery is not a status: the entry leaves the queue and
/// becomes a [`SentMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    /// Terminal. Retries exhausted.
    Failed,
}

/// An entry in `scheduled.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledMessage {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Recipient handle (phone number, email, chat id)
    pub destination: String,
    /// Message text
    pub body: String,
    pub scheduled_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status: MessageStatus,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ScheduledMessage {
    /// Create a fresh pending entry with a new UUID.
    pub fn new(
        destination: impl Into<String>,
        body: impl Into<String>,
        scheduled_time: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            destination: destination.into(),
            body: body.into(),
            scheduled_time,
            created_at,
            status: MessageStatus::Pending,
            retry_count: 0,
            last_error: None,
        }
    }

    /// First 8 characters of the id, as shown in listings.
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }

    /// Build the history record for a successful send.
    pub fn into_sent(self, sent_at: DateTime<Utc>) -> SentMessage {
        SentMessage {
            id: self.id,
            destination: self.destination,
            body: self.body,
            scheduled_time: self.scheduled_time,
            created_at: self.created_at,
            sent_at,
        }
    }
}

/// An entry in `sent.json`. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub id: String,
    pub destination: String,
    pub body: String,
    pub scheduled_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub sent_at: DateTime<Utc>,
}

impl SentMessage {
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

/// Contents of `daemon.json`. One record per daemon lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonState {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub last_check_at: DateTime<Utc>,
    /// Whether the message sender reported ready
    pub connected: bool,
    pub last_heartbeat: DateTime<Utc>,
}

impl DaemonState {
    /// Initial record written at daemon startup.
    pub fn starting(pid: u32, now: DateTime<Utc>) -> Self {
        Self {
            pid,
            started_at: now,
            last_check_at: now,
            connected: false,
            last_heartbeat: now,
        }
    }
}

/// Partial update for a pending entry. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct MessageUpdate {
    pub destination: Option<String>,
    pub body: Option<String>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub status: Option<MessageStatus>,
    pub retry_count: Option<u32>,
    pub last_error: Option<String>,
}

impl MessageUpdate {
    /// Apply the set fields onto `message`.
    pub fn apply(self, message: &mut ScheduledMessage) {
        if let Some(destination) = self.destination {
            message.destination = destination;
        }
        if let Some(body) = self.body {
            message.body = body;
        }
        if let Some(scheduled_time) = self.scheduled_time {
            message.scheduled_time = scheduled_time;
        }
        if let Some(status) = self.status {
            message.status = status;
        }
        if let Some(retry_count) = self.retry_count {
            message.retry_count = retry_count;
        }
        if let Some(last_error) = self.last_error {
            message.last_error = Some(last_error);
        }
    }
}

/// Partial update for the daemon record.
#[derive(Debug, Clone, Default)]
pub struct DaemonStateUpdate {
    pub last_check_at: Option<DateTime<Utc>>,
    pub connected: Option<bool>,
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl DaemonStateUpdate {
    pub fn apply(self, state: &mut DaemonState) {
        if let Some(last_check_at) = self.last_check_at {
            state.last_check_at = last_check_at;
        }
        if let Some(connected) = self.connected {
            state.connected = connected;
        }
        if let Some(last_heartbeat) = self.last_heartbeat {
            state.last_heartbeat = last_heartbeat;
        }
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
