//! Daemon mode: liveness protocol, signals, startup/shutdown.
//!
//! CHANGELOG:
//! - 10/19/2026 - Heartbeat liveness and scheduler runtime (Claude)
//! - 01/10/2026 - Initial module structure (Phase 4C, Claude)

pub mod liveness;
pub mod runtime;
pub mod signals;

pub use liveness::{Heartbeat, LivenessTimings};
pub use runtime::{Daemon, ExitReason};
pub use signals::install_signal_handler;
