//! Collaborator seams: message delivery and failure notification.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial module structure (Claude)

pub mod applescript;
pub mod notify;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ScheduledMessage;

/// Outbound transport for due messages.
///
/// The scheduler never calls `send` from two tasks at once; implementations
/// need not be reentrant.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Begin bringing the transport up. Readiness is reported through
    /// [`is_ready`](Self::is_ready), which may turn true later.
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    /// Whether `send` may be attempted right now.
    fn is_ready(&self) -> bool;

    /// Deliver `body` to `destination`. `true` means accepted for delivery;
    /// transport details stay inside the implementation.
    async fn send(&self, destination: &str, body: &str) -> bool;

    /// Release transport resources. Called once during shutdown.
    async fn close(&self) -> Result<()>;
}

/// Receiver of permanent-failure reports.
///
/// Best effort: implementations log their own errors and never return them.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, failed: &ScheduledMessage);
}

pub use applescript::AppleScriptSender;
pub use notify::{failure_report, EmailNotifier, LogNotifier};
