//! Runtime context shared by the scheduler and the liveness tasks.
//!
//! CHANGELOG:
//! - 10/19/2026 - Injectable clock for post-send timestamps (Claude)
//! - 10/19/2026 - Initial implementation (Claude)

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::lifecycle::Clock;
use crate::sender::{MessageSender, NotificationSink};
use crate::store::{DaemonStateStore, MessageStore};

/// Everything a running daemon needs, built once at startup.
pub struct RuntimeContext {
    pub config: Config,
    pub messages: MessageStore,
    pub daemon_state: DaemonStateStore,
    /// Exclusive transport. Only the scheduler task sends.
    pub sender: Arc<dyn MessageSender>,
    pub notifier: Arc<dyn NotificationSink>,
    /// Cancelled when a background task dies unexpectedly.
    pub fault: CancellationToken,
    /// Source of `sentAt`, retry bases and `lastCheckAt`.
    pub clock: Arc<Clock>,
}

impl RuntimeContext {
    pub fn new(
        config: Config,
        sender: Arc<dyn MessageSender>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            messages: MessageStore::new(&config.data_dir),
            daemon_state: DaemonStateStore::new(&config.data_dir),
            config,
            sender,
            notifier,
            fault: CancellationToken::new(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock (tests, replays).
    pub fn with_clock(mut self, clock: Arc<Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}
