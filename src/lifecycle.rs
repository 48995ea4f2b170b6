//! Message lifecycle: due check, send, retry backoff, permanent failure.
//!
//! ```text
//! pending --send ok--------------------------> (moved to sent history)
//! pending --send failed, retries left--------> pending (rescheduled)
//! pending --send failed, retries exhausted---> failed (terminal)
//! ```
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation (Claude)

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use crate::error::Result;
use crate::sender::{MessageSender, NotificationSink};
use crate::store::MessageStore;
use crate::types::{MessageStatus, MessageUpdate, ScheduledMessage};

/// Retry attempts allowed after the original send.
pub const MAX_RETRIES: u32 = 3;

/// Backoff before retry 1, 2 and 3, in seconds.
pub const RETRY_DELAYS_SECS: [i64; MAX_RETRIES as usize] = [60, 300, 900];

/// Delay before the retry following failure number `attempt` (1-based).
pub fn retry_delay(attempt: u32) -> Option<Duration> {
    let index = usize::try_from(attempt.checked_sub(1)?).ok()?;
    RETRY_DELAYS_SECS.get(index).map(|secs| Duration::seconds(*secs))
}

/// A message is due iff it is pending and its time has come.
pub fn is_due(message: &ScheduledMessage, now: DateTime<Utc>) -> bool {
    message.status == MessageStatus::Pending && message.scheduled_time <= now
}

/// State change produced by one failed send.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureTransition {
    Retry {
        retry_count: u32,
        scheduled_time: DateTime<Utc>,
        note: String,
    },
    Exhausted {
        retry_count: u32,
        last_error: String,
    },
}

impl FailureTransition {
    /// Compute the transition for `message` failing at `now`.
    pub fn after_failure(message: &ScheduledMessage, now: DateTime<Utc>) -> Self {
        let retry_count = message.retry_count.saturating_add(1);

        match retry_delay(retry_count) {
            Some(delay) if retry_count <= MAX_RETRIES => Self::Retry {
                retry_count,
                scheduled_time: now + delay,
                note: format!(
                    "Send attempt {} failed, retrying in {} minutes",
                    retry_count,
                    delay.num_minutes()
                ),
            },
            _ => Self::Exhausted {
                retry_count,
                last_error: format!("failed after {} retry attempts", MAX_RETRIES),
            },
        }
    }

    pub fn to_update(&self) -> MessageUpdate {
        match self {
            Self::Retry {
                retry_count,
                scheduled_time,
                note,
            } => MessageUpdate {
                retry_count: Some(*retry_count),
                scheduled_time: Some(*scheduled_time),
                last_error: Some(note.clone()),
                ..Default::default()
            },
            Self::Exhausted {
                retry_count,
                last_error,
            } => MessageUpdate {
                status: Some(MessageStatus::Failed),
                retry_count: Some(*retry_count),
                last_error: Some(last_error.clone()),
                ..Default::default()
            },
        }
    }
}

/// What happened to one message during a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// Sender not ready; untouched, reconsidered next tick.
    NotReady,
    /// Not pending or not yet due; untouched.
    Skipped,
    Sent,
    Retrying {
        retry_count: u32,
        next_attempt: DateTime<Utc>,
    },
    Failed,
}

/// Wall-clock source for timestamps written after a send attempt.
pub type Clock = dyn Fn() -> DateTime<Utc> + Send + Sync;

/// Drive one message through a send attempt and persist the result.
///
/// `now` decides whether the message is due. `sentAt` and the retry base are
/// read from `clock` once the send attempt has returned.
///
/// Storage errors propagate to the caller; notification problems never do.
pub async fn process(
    message: ScheduledMessage,
    sender: &dyn MessageSender,
    notifier: &dyn NotificationSink,
    store: &MessageStore,
    now: DateTime<Utc>,
    clock: &Clock,
) -> Result<ProcessOutcome> {
    if !is_due(&message, now) {
        return Ok(ProcessOutcome::Skipped);
    }

    info!(
        id = %message.id,
        destination = %message.destination,
        retry_count = message.retry_count,
        "Processing message"
    );

    if !sender.is_ready() {
        warn!(id = %message.id, "Sender not ready, will retry later");
        return Ok(ProcessOutcome::NotReady);
    }

    let delivered = sender.send(&message.destination, &message.body).await;
    let finished_at = clock();

    if delivered {
        let id = message.id.clone();
        store.move_to_sent(message, finished_at).await?;
        info!(id = %id, "Message sent and moved to sent history");
        return Ok(ProcessOutcome::Sent);
    }

    let transition = FailureTransition::after_failure(&message, finished_at);
    warn!(id = %message.id, retry_count = message.retry_count.saturating_add(1), "Message send failed");

    if !store.update_pending(&message.id, transition.to_update()).await? {
        warn!(id = %message.id, "Message vanished from queue before failure was recorded");
    }

    match &transition {
        FailureTransition::Retry {
            retry_count,
            scheduled_time,
            ..
        } => {
            info!(
                id = %message.id,
                retry_count = *retry_count,
                next_attempt = %scheduled_time,
                "Message rescheduled for retry"
            );
            Ok(ProcessOutcome::Retrying {
                retry_count: *retry_count,
                next_attempt: *scheduled_time,
            })
        }
        FailureTransition::Exhausted { .. } => {
            error!(
                id = %message.id,
                destination = %message.destination,
                "Message permanently failed after max retries"
            );
            let mut failed = message;
            transition.to_update().apply(&mut failed);
            notifier.notify(&failed).await;
            Ok(ProcessOutcome::Failed)
        }
    }
}
