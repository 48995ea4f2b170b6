//! Durable JSON-backed store.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial module structure (Claude)

pub mod atomic;
pub mod daemon_state;
pub mod messages;

pub use daemon_state::DaemonStateStore;
pub use messages::{MessageStore, PrefixMatch};
