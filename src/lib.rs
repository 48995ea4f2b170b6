//! wolfies-scheduler library
//!
//! Durable scheduled-message queue with retry/backoff, a poll scheduler and
//! a heartbeat-based daemon liveness protocol. Shared by the CLI and daemon
//! binaries.
//!
//! CHANGELOG:
//! - 10/19/2026 - Scheduler daemon modules (Claude)
//! - 01/10/2026 - Initial library structure (Phase 4C, Claude)

// Core modules
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod scheduler;
pub mod store;
pub mod types;

// Runtime and collaborators
pub mod context;
pub mod daemon;
pub mod sender;

// CLI surface
pub mod commands;
pub mod logging;
pub mod output;

pub use error::{Result, SchedulerError};
