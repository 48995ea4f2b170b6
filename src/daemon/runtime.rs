//! Daemon startup and shutdown protocol.
//!
//! Startup: liveness record -> heartbeat -> sender connect -> readiness gate
//! -> `connected = true` -> scheduler. Shutdown runs the reverse once:
//! heartbeat -> scheduler -> sender -> liveness record.
//!
//! CHANGELOG:
//! - 10/19/2026 - Honor stop requests during startup (Claude)
//! - 10/19/2026 - Initial implementation (Claude)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::liveness::{self, Heartbeat, LivenessTimings};
use crate::context::RuntimeContext;
use crate::scheduler::Scheduler;
use crate::types::{DaemonState, DaemonStateUpdate};

/// Why the daemon stopped running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Termination signal or explicit request
    Requested,
    /// A background task failed unexpectedly
    Fault,
}

/// A running (or about to run) scheduler daemon.
pub struct Daemon {
    ctx: Arc<RuntimeContext>,
    timings: LivenessTimings,
    heartbeat: Heartbeat,
    scheduler: Scheduler,
    shutting_down: AtomicBool,
}

impl Daemon {
    pub fn new(ctx: Arc<RuntimeContext>, timings: LivenessTimings) -> Self {
        let heartbeat = Heartbeat::new(ctx.daemon_state.clone(), timings.heartbeat_period);
        let scheduler = Scheduler::new(ctx.clone(), ctx.config.check_interval);
        Self {
            ctx,
            timings,
            heartbeat,
            scheduler,
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn context(&self) -> &Arc<RuntimeContext> {
        &self.ctx
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Bring the daemon up. Errors here are fatal startup failures.
    pub async fn startup(&self) -> Result<()> {
        info!("Starting scheduler daemon");

        self.ctx
            .config
            .ensure_data_dir()
            .context("Failed to create data directory")?;

        let pid = std::process::id();
        self.ctx
            .daemon_state
            .save(&DaemonState::starting(pid, Utc::now()))
            .await
            .context("Failed to write daemon state")?;
        info!(pid, "Daemon state created");

        self.heartbeat.start().await;

        self.ctx
            .sender
            .connect()
            .await
            .context("Failed to initialize message sender")?;
        liveness::wait_for_ready(&self.ctx.sender, self.timings)
            .await
            .context("Message sender failed to become ready")?;

        self.ctx
            .daemon_state
            .update(DaemonStateUpdate {
                connected: Some(true),
                ..Default::default()
            })
            .await
            .context("Failed to record sender connection")?;

        self.scheduler.start();
        info!("Scheduler daemon is running");
        Ok(())
    }

    /// Tear everything down. Runs at most once; every step runs even when
    /// an earlier one fails.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down");

        self.heartbeat.stop().await;
        self.scheduler.stop().await;

        if let Err(e) = self.ctx.sender.close().await {
            warn!(error = %e, "Error closing message sender");
        }

        self.ctx.daemon_state.remove().await;
        info!("Shutdown complete");
    }

    /// Start, then wait for `stop` or a runtime fault, then shut down.
    ///
    /// `stop` is honored during startup as well; a termination request that
    /// arrives before the scheduler is up skips it entirely.
    ///
    /// Returns `Err` for startup failures and faults so the caller exits
    /// nonzero.
    pub async fn run(&self, stop: CancellationToken) -> Result<ExitReason> {
        let started = tokio::select! {
            biased;
            _ = stop.cancelled() => None,
            result = self.startup() => Some(result),
        };

        match started {
            None => {
                info!("Termination requested during startup");
                self.shutdown().await;
                return Ok(ExitReason::Requested);
            }
            Some(Err(e)) => {
                error!(error = %format!("{:#}", e), "Fatal error during daemon startup");
                self.shutdown().await;
                return Err(e);
            }
            Some(Ok(())) => {}
        }

        let reason = tokio::select! {
            _ = stop.cancelled() => ExitReason::Requested,
            _ = self.ctx.fault.cancelled() => ExitReason::Fault,
        };

        self.shutdown().await;

        match reason {
            ExitReason::Requested => Ok(reason),
            ExitReason::Fault => Err(anyhow::anyhow!("Daemon stopped after a runtime fault")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::Result as StoreResult;
    use crate::scheduler::SchedulerState;
    use crate::sender::{LogNotifier, MessageSender};
    use crate::types::ScheduledMessage;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    struct StaticSender {
        ready: AtomicBool,
        closed: AtomicBool,
        sends: AtomicUsize,
        fail_close: bool,
        panic_on_send: bool,
    }

    impl StaticSender {
        fn new(ready: bool, fail_close: bool) -> Self {
            Self {
                ready: AtomicBool::new(ready),
                closed: AtomicBool::new(false),
                sends: AtomicUsize::new(0),
                fail_close,
                panic_on_send: false,
            }
        }

        fn panicking() -> Self {
            Self {
                panic_on_send: true,
                ..Self::new(true, false)
            }
        }
    }

    #[async_trait]
    impl MessageSender for StaticSender {
        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        async fn send(&self, _destination: &str, _body: &str) -> bool {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if self.panic_on_send {
                panic!("transport blew up");
            }
            true
        }

        async fn close(&self) -> StoreResult<()> {
            self.closed.store(true, Ordering::SeqCst);
            if self.fail_close {
                return Err(crate::error::SchedulerError::SenderUnavailable(
                    "already gone".to_string(),
                ));
            }
            Ok(())
        }
    }

    fn timings(readiness_timeout: Duration) -> LivenessTimings {
        LivenessTimings {
            heartbeat_period: Duration::from_millis(20),
            readiness_poll: Duration::from_millis(5),
            readiness_timeout,
        }
    }

    fn daemon_with(dir: &std::path::Path, sender: Arc<StaticSender>, timings: LivenessTimings) -> Daemon {
        let config = Config::from_lookup(|_| None).with_data_dir(dir.to_string_lossy());
        let ctx = RuntimeContext::new(config, sender, Arc::new(LogNotifier));
        Daemon::new(Arc::new(ctx), timings)
    }

    fn daemon(dir: &std::path::Path, sender: Arc<StaticSender>) -> Daemon {
        daemon_with(dir, sender, timings(Duration::from_millis(50)))
    }

    async fn queue_due_message(daemon: &Daemon) -> String {
        let now = Utc::now();
        let msg = ScheduledMessage::new("+1", "due", now - chrono::Duration::seconds(1), now);
        let id = msg.id.clone();
        daemon.context().messages.add_pending(msg).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_startup_writes_connected_record() {
        let dir = tempfile::tempdir().unwrap();
        let sender = Arc::new(StaticSender::new(true, false));
        let daemon = daemon(dir.path(), sender.clone());

        daemon.startup().await.unwrap();
        let state = daemon.context().daemon_state.load().await.unwrap().unwrap();
        assert_eq!(state.pid, std::process::id());
        assert!(state.connected);
        assert_eq!(daemon.scheduler().state(), SchedulerState::Running);

        daemon.shutdown().await;
        assert!(sender.closed.load(Ordering::SeqCst));
        assert!(daemon.context().daemon_state.load().await.unwrap().is_none());
        assert_eq!(daemon.scheduler().state(), SchedulerState::Stopped);
    }

    #[tokio::test]
    async fn test_readiness_timeout_is_fatal_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let sender = Arc::new(StaticSender::new(false, false));
        let daemon = daemon(dir.path(), sender);

        let result = daemon.run(CancellationToken::new()).await;
        assert!(result.is_err());
        assert!(!daemon.context().daemon_state.path().exists());
        assert_eq!(daemon.scheduler().state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_shutdown_continues_past_close_error() {
        let dir = tempfile::tempdir().unwrap();
        let sender = Arc::new(StaticSender::new(true, true));
        let daemon = daemon(dir.path(), sender.clone());

        daemon.startup().await.unwrap();
        daemon.shutdown().await;
        daemon.shutdown().await;
        assert!(sender.closed.load(Ordering::SeqCst));
        assert!(!daemon.context().daemon_state.path().exists());
    }

    #[tokio::test]
    async fn test_run_until_stop_requested() {
        let dir = tempfile::tempdir().unwrap();
        let sender = Arc::new(StaticSender::new(true, false));
        let daemon = daemon(dir.path(), sender);

        let stop = CancellationToken::new();
        let trigger = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let reason = daemon.run(stop).await.unwrap();
        assert_eq!(reason, ExitReason::Requested);
        assert!(!daemon.context().daemon_state.path().exists());
    }

    #[tokio::test]
    async fn test_stop_requested_before_startup_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let sender = Arc::new(StaticSender::new(false, false));
        let daemon = daemon_with(dir.path(), sender.clone(), timings(Duration::from_secs(5)));
        let id = queue_due_message(&daemon).await;

        let flip = sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            flip.ready.store(true, Ordering::SeqCst);
        });

        let stop = CancellationToken::new();
        stop.cancel();
        let reason = daemon.run(stop).await.unwrap();
        assert_eq!(reason, ExitReason::Requested);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(sender.sends.load(Ordering::SeqCst), 0);
        assert!(daemon.context().messages.find_pending(&id).await.unwrap().is_some());
        assert_ne!(daemon.scheduler().state(), SchedulerState::Running);
    }

    #[tokio::test]
    async fn test_stop_during_readiness_wait_shuts_down_promptly() {
        let dir = tempfile::tempdir().unwrap();
        let sender = Arc::new(StaticSender::new(false, false));
        let daemon = daemon_with(dir.path(), sender.clone(), timings(Duration::from_secs(30)));
        queue_due_message(&daemon).await;

        let stop = CancellationToken::new();
        let trigger = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let began = Instant::now();
        let reason = daemon.run(stop).await.unwrap();
        assert_eq!(reason, ExitReason::Requested);
        assert!(began.elapsed() < Duration::from_secs(5));

        assert!(sender.closed.load(Ordering::SeqCst));
        assert_eq!(sender.sends.load(Ordering::SeqCst), 0);
        assert!(!daemon.context().daemon_state.path().exists());
    }

    #[tokio::test]
    async fn test_fault_triggers_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let sender = Arc::new(StaticSender::new(true, false));
        let daemon = daemon(dir.path(), sender);

        daemon.context().fault.cancel();
        assert!(daemon.run(CancellationToken::new()).await.is_err());
        assert!(!daemon.context().daemon_state.path().exists());
    }

    #[tokio::test]
    async fn test_panicking_tick_fails_run_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let sender = Arc::new(StaticSender::panicking());
        let daemon = daemon(dir.path(), sender.clone());
        let id = queue_due_message(&daemon).await;

        let result = tokio::time::timeout(Duration::from_secs(5), daemon.run(CancellationToken::new()))
            .await
            .unwrap();
        assert!(result.is_err());
        assert_eq!(sender.sends.load(Ordering::SeqCst), 1);
        assert!(sender.closed.load(Ordering::SeqCst));
        assert!(!daemon.context().daemon_state.path().exists());
        assert!(daemon.context().messages.find_pending(&id).await.unwrap().is_some());
    }
}
