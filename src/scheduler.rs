//! Poll-based scheduler: find due messages, process them one at a time.
//!
//! CHANGELOG:
//! - 10/19/2026 - First poll runs inside the guarded loop (Claude)
//! - 10/19/2026 - Initial implementation (Claude)

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::RuntimeContext;
use crate::error::Result;
use crate::lifecycle::{self, ProcessOutcome};
use crate::types::DaemonStateUpdate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Summary of one poll.
#[derive(Debug, Default)]
pub struct TickReport {
    pub due: usize,
    pub outcomes: Vec<(String, ProcessOutcome)>,
    /// Messages whose processing hit a storage error
    pub errors: usize,
}

/// Run one poll: load the queue, process messages due at `now`
/// sequentially in stored order, then record the check time.
///
/// Per-message timestamps and `lastCheckAt` come from the context clock,
/// read when each step finishes.
pub async fn check_due_messages(ctx: &RuntimeContext, now: DateTime<Utc>) -> Result<TickReport> {
    debug!("Checking for due messages");

    let due: Vec<_> = ctx
        .messages
        .list_pending()
        .await?
        .into_iter()
        .filter(|m| lifecycle::is_due(m, now))
        .collect();

    let mut report = TickReport {
        due: due.len(),
        ..Default::default()
    };

    if due.is_empty() {
        debug!("No due messages found");
    } else {
        info!(count = due.len(), "Found due messages");
    }

    for message in due {
        let id = message.id.clone();
        match lifecycle::process(
            message,
            ctx.sender.as_ref(),
            ctx.notifier.as_ref(),
            &ctx.messages,
            now,
            ctx.clock.as_ref(),
        )
        .await
        {
            Ok(outcome) => report.outcomes.push((id, outcome)),
            Err(e) => {
                error!(id = %id, error = %e, "Error processing message");
                report.errors += 1;
            }
        }
    }

    ctx.daemon_state
        .update(DaemonStateUpdate {
            last_check_at: Some(ctx.now()),
            ..Default::default()
        })
        .await?;

    Ok(report)
}

/// [`check_due_messages`] at the current clock time, errors logged instead
/// of returned.
pub async fn poll_once(ctx: &RuntimeContext) -> Option<TickReport> {
    match check_due_messages(ctx, ctx.now()).await {
        Ok(report) => Some(report),
        Err(e) => {
            error!(error = %e, "Error checking for due messages");
            None
        }
    }
}

struct Inner {
    state: SchedulerState,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

/// Periodic driver around [`poll_once`].
pub struct Scheduler {
    ctx: Arc<RuntimeContext>,
    interval: Duration,
    inner: Mutex<Inner>,
}

impl Scheduler {
    pub fn new(ctx: Arc<RuntimeContext>, interval: Duration) -> Self {
        Self {
            ctx,
            interval,
            inner: Mutex::new(Inner {
                state: SchedulerState::Idle,
                cancel: None,
                task: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> SchedulerState {
        self.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Spawn the poll loop: one poll right away, then every `interval`.
    /// No-op when running.
    pub fn start(&self) {
        let mut inner = self.lock();
        if inner.state == SchedulerState::Running {
            warn!("Scheduler is already running");
            return;
        }

        info!(interval_secs = self.interval.as_secs(), "Starting scheduler");
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(self.ctx.clone(), self.interval, cancel.clone()));
        inner.state = SchedulerState::Running;
        inner.cancel = Some(cancel);
        inner.task = Some(task);
    }

    /// Cancel the periodic tick and wait for an in-flight poll to finish.
    /// No-op when not running.
    pub async fn stop(&self) {
        let (cancel, task) = {
            let mut inner = self.lock();
            if inner.state != SchedulerState::Running {
                return;
            }
            inner.state = SchedulerState::Stopped;
            (inner.cancel.take(), inner.task.take())
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Scheduler task ended abnormally");
            }
        }
        info!("Scheduler stopped");
    }
}

async fn run_loop(ctx: Arc<RuntimeContext>, period: Duration, cancel: CancellationToken) {
    // First tick completes immediately
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                // Each poll runs as its own task so a panic surfaces as a
                // JoinError here instead of unwinding through the loop.
                let tick_ctx = ctx.clone();
                let result = tokio::spawn(async move {
                    poll_once(&tick_ctx).await;
                })
                .await;

                if let Err(e) = result {
                    if e.is_panic() {
                        error!(error = %e, "Scheduler tick panicked");
                        ctx.fault.cancel();
                    }
                    break;
                }
            }
        }
    }
    debug!("Scheduler loop exited");
}
