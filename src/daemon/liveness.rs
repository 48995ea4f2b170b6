//! Heartbeat timer and the sender readiness gate.
//!
//! The heartbeat runs on its own fixed period, independent of the scheduler
//! tick. Other processes read `daemon.json` and treat a heartbeat older than
//! [`HEARTBEAT_TIMEOUT`](crate::store::daemon_state::HEARTBEAT_TIMEOUT) as a
//! dead daemon.
//!
//! CHANGELOG:
//! - 10/19/2026 - Recover the timer handle from a poisoned lock (Claude)
//! - 10/19/2026 - Initial implementation (Claude)

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, SchedulerError};
use crate::sender::MessageSender;
use crate::store::DaemonStateStore;

/// Fixed timing of the liveness protocol.
#[derive(Debug, Clone, Copy)]
pub struct LivenessTimings {
    pub heartbeat_period: Duration,
    pub readiness_poll: Duration,
    pub readiness_timeout: Duration,
}

impl Default for LivenessTimings {
    fn default() -> Self {
        Self {
            heartbeat_period: Duration::from_secs(60),
            readiness_poll: Duration::from_secs(1),
            readiness_timeout: Duration::from_secs(5 * 60),
        }
    }
}

/// Periodic `lastHeartbeat` writer.
pub struct Heartbeat {
    store: DaemonStateStore,
    period: Duration,
    running: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl Heartbeat {
    pub fn new(store: DaemonStateStore, period: Duration) -> Self {
        Self {
            store,
            period,
            running: Mutex::new(None),
        }
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<(CancellationToken, JoinHandle<()>)>> {
        self.running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write one heartbeat now, then every period. No-op when started.
    pub async fn start(&self) {
        if self.is_running() {
            return;
        }

        beat(&self.store).await;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(self.store.clone(), self.period, cancel.clone()));
        *self.lock_running() = Some((cancel, task));
        debug!("Heartbeat started");
    }

    pub fn is_running(&self) -> bool {
        self.lock_running().is_some()
    }

    /// Cancel the timer. No-op when not started.
    pub async fn stop(&self) {
        let running = self.lock_running().take();

        if let Some((cancel, task)) = running {
            cancel.cancel();
            let _ = task.await;
            debug!("Heartbeat stopped");
        }
    }
}

async fn beat(store: &DaemonStateStore) {
    if let Err(e) = store.touch_heartbeat(Utc::now()).await {
        warn!(error = %e, "Failed to write heartbeat");
    }
}

async fn run_loop(store: DaemonStateStore, period: Duration, cancel: CancellationToken) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => beat(&store).await,
        }
    }
}

/// Poll `sender.is_ready()` until it holds or the timeout passes.
pub async fn wait_for_ready(sender: &Arc<dyn MessageSender>, timings: LivenessTimings) -> Result<()> {
    let deadline = Instant::now() + timings.readiness_timeout;

    while !sender.is_ready() {
        if Instant::now() >= deadline {
            return Err(SchedulerError::StartupTimeout(timings.readiness_timeout));
        }
        time::sleep(timings.readiness_poll).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DaemonState;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Becomes ready after `is_ready` has been asked `after` times.
    struct SlowSender {
        after: usize,
        asked: AtomicUsize,
    }

    #[async_trait]
    impl MessageSender for SlowSender {
        fn is_ready(&self) -> bool {
            self.asked.fetch_add(1, Ordering::SeqCst) >= self.after
        }

        async fn send(&self, _destination: &str, _body: &str) -> bool {
            false
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn fast() -> LivenessTimings {
        LivenessTimings {
            heartbeat_period: Duration::from_millis(20),
            readiness_poll: Duration::from_millis(5),
            readiness_timeout: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn test_wait_for_ready_succeeds() {
        let sender: Arc<dyn MessageSender> = Arc::new(SlowSender {
            after: 3,
            asked: AtomicUsize::new(0),
        });
        wait_for_ready(&sender, fast()).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_ready_times_out() {
        let sender: Arc<dyn MessageSender> = Arc::new(SlowSender {
            after: usize::MAX,
            asked: AtomicUsize::new(0),
        });
        let err = wait_for_ready(&sender, fast()).await.unwrap_err();
        assert!(matches!(err, SchedulerError::StartupTimeout(_)));
    }

    #[tokio::test]
    async fn test_heartbeat_without_record_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = DaemonStateStore::new(dir.path());
        let heartbeat = Heartbeat::new(store.clone(), fast().heartbeat_period);
        heartbeat.start().await;
        time::sleep(Duration::from_millis(50)).await;
        heartbeat.stop().await;
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_heartbeat_refreshes_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = DaemonStateStore::new(dir.path());
        let old = Utc.timestamp_opt(1_000, 0).unwrap();
        store.save(&DaemonState::starting(7, old)).await.unwrap();

        let heartbeat = Heartbeat::new(store.clone(), fast().heartbeat_period);
        heartbeat.start().await;
        assert!(heartbeat.is_running());
        heartbeat.stop().await;
        heartbeat.stop().await;
        assert!(!heartbeat.is_running());

        let state = store.load().await.unwrap().unwrap();
        assert!(state.last_heartbeat > old);
        assert_eq!(state.started_at, old);
        assert!(store.is_running().await.unwrap());
    }

    #[tokio::test]
    async fn test_heartbeat_survives_poisoned_lock() {
        let dir = tempfile::tempdir().unwrap();
        let store = DaemonStateStore::new(dir.path());
        let old = Utc.timestamp_opt(1_000, 0).unwrap();
        store.save(&DaemonState::starting(7, old)).await.unwrap();

        let heartbeat = Heartbeat::new(store.clone(), fast().heartbeat_period);
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = heartbeat.running.lock().unwrap();
            panic!("poison the timer lock");
        }));
        assert!(heartbeat.running.is_poisoned());

        heartbeat.start().await;
        assert!(heartbeat.is_running());

        // Timer keeps writing after the first beat
        let first = store.load().await.unwrap().unwrap().last_heartbeat;
        time::sleep(Duration::from_millis(60)).await;
        let later = store.load().await.unwrap().unwrap().last_heartbeat;
        assert!(later > first);

        heartbeat.stop().await;
        assert!(!heartbeat.is_running());
        let stopped = store.load().await.unwrap().unwrap().last_heartbeat;
        time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.load().await.unwrap().unwrap().last_heartbeat, stopped);
    }
}
