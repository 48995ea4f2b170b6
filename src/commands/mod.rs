//! Command implementations.
//!
//! CHANGELOG:
//! - 10/19/2026 - Scheduler queue commands (Claude)
//! - 01/10/2026 - Initial module structure (Claude)

pub mod queue;
pub mod schedule;
pub mod status;
