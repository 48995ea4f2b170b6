//! iMessage delivery through Messages.app via `osascript`.
//!
//! CHANGELOG:
//! - 10/19/2026 - Async MessageSender with readiness check (Claude)
//! - 01/10/2026 - Initial implementation (Claude)

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{error, info};

use super::MessageSender;
use crate::error::{Result, SchedulerError};

/// Escape a string for safe inclusion in AppleScript.
///
/// CRITICAL: Order matters!
/// 1. Escape backslashes FIRST
/// 2. Then escape quotes
pub fn escape_applescript_string(s: &str) -> String {
    s.replace('\\', "\\\\") // Backslashes FIRST
        .replace('"', "\\\"") // Then quotes
}

/// AppleScript that sends `message` to `participant` over the iMessage service.
pub fn build_send_script(participant: &str, message: &str) -> String {
    format!(
        r#"
tell application "Messages"
    set targetService to 1st account whose service type = iMessage
    set targetBuddy to participant "{}" of targetService
    send "{}" to targetBuddy
end tell
"#,
        escape_applescript_string(participant),
        escape_applescript_string(message)
    )
}

/// Sends scheduled messages as iMessages.
pub struct AppleScriptSender {
    program: String,
    ready: AtomicBool,
}

impl AppleScriptSender {
    pub fn new() -> Self {
        Self::with_program("osascript")
    }

    /// Use a different interpreter binary (tests, wrappers).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ready: AtomicBool::new(false),
        }
    }

    /// Run a trivial script; marks the sender ready on success.
    async fn check_interpreter(&self) -> Result<()> {
        let output = Command::new(&self.program)
            .arg("-e")
            .arg(r#"return "ok""#)
            .output()
            .await
            .map_err(|e| SchedulerError::SenderUnavailable(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SchedulerError::SenderUnavailable(stderr.trim().to_string()));
        }

        self.ready.store(true, Ordering::SeqCst);
        info!(program = %self.program, "AppleScript sender ready");
        Ok(())
    }
}

impl Default for AppleScriptSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageSender for AppleScriptSender {
    async fn connect(&self) -> Result<()> {
        self.check_interpreter().await
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn send(&self, destination: &str, body: &str) -> bool {
        let script = build_send_script(destination, body);

        match Command::new(&self.program).arg("-e").arg(&script).output().await {
            Ok(output) if output.status.success() => {
                info!(destination = %destination, "Message sent successfully");
                true
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                error!(destination = %destination, error = %stderr.trim(), "AppleScript failed");
                false
            }
            Err(e) => {
                error!(destination = %destination, error = %e, "Failed to run AppleScript");
                false
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.ready.store(false, Ordering::SeqCst);
        info!("AppleScript sender closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_simple() {
        assert_eq!(escape_applescript_string("Hello"), "Hello");
    }

    #[test]
    fn test_escape_quotes() {
        assert_eq!(escape_applescript_string(r#"Say "Hi""#), r#"Say \"Hi\""#);
    }

    #[test]
    fn test_escape_order_matters() {
        // Backslash before quote: \\ first, then \"
        let input = r#"\"test\""#;
        let expected = r#"\\\"test\\\""#;
        assert_eq!(escape_applescript_string(input), expected);
    }

    #[test]
    fn test_script_embeds_escaped_values() {
        let script = build_send_script("+14155551234", r#"a "quoted" note"#);
        assert!(script.contains(r#"participant "+14155551234""#));
        assert!(script.contains(r#"send "a \"quoted\" note""#));
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_unavailable() {
        let sender = AppleScriptSender::with_program("/nonexistent/osascript");
        let err = sender.connect().await.unwrap_err();
        assert!(matches!(err, SchedulerError::SenderUnavailable(_)));
        assert!(!sender.is_ready());
        assert!(!sender.send("+1", "x").await);
    }

    #[tokio::test]
    async fn test_close_clears_readiness() {
        // `true` ignores its arguments and exits 0.
        let sender = AppleScriptSender::with_program("true");
        sender.connect().await.unwrap();
        assert!(sender.is_ready());
        sender.close().await.unwrap();
        assert!(!sender.is_ready());
    }
}
