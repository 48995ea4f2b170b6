//! `schedule`: add a message to the pending queue.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation (Claude)

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::error::SchedulerError;
use crate::output::OutputControls;
use crate::store::MessageStore;
use crate::types::ScheduledMessage;

static RELATIVE_OFFSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+(\d+)([smhd])$").expect("valid offset regex"));

/// Parse a send time: RFC 3339, or `+<n>{s|m|h|d}` relative to `now`.
///
/// The result must lie strictly after `now`.
pub fn parse_when(input: &str, now: DateTime<Utc>) -> std::result::Result<DateTime<Utc>, SchedulerError> {
    let input = input.trim();
    let too_large = || SchedulerError::InvalidSchedule(format!("offset too large: {}", input));

    let when = if let Some(caps) = RELATIVE_OFFSET.captures(input) {
        let amount: i64 = caps[1].parse().map_err(|_| too_large())?;
        let unit_secs = match &caps[2] {
            "s" => 1,
            "m" => 60,
            "h" => 3_600,
            _ => 86_400,
        };
        let offset = amount
            .checked_mul(unit_secs)
            .and_then(Duration::try_seconds)
            .ok_or_else(too_large)?;
        now.checked_add_signed(offset).ok_or_else(too_large)?
    } else {
        DateTime::parse_from_rfc3339(input)
            .map_err(|_| {
                SchedulerError::InvalidSchedule(format!(
                    "'{}' is neither RFC 3339 (2026-10-19T14:00:00Z) nor +<n>s/m/h/d",
                    input
                ))
            })?
            .with_timezone(&Utc)
    };

    if when <= now {
        return Err(SchedulerError::InvalidSchedule(format!(
            "time must be in the future (got {})",
            when.to_rfc3339()
        )));
    }
    Ok(when)
}

/// Message text from the positional words or a UTF-8 file.
async fn read_body(message: &[String], file: Option<&Path>) -> Result<String> {
    let body = match (message.is_empty(), file) {
        (false, Some(_)) => bail!("Give the message inline or with --file, not both"),
        (true, None) => bail!("Message text is required (inline or --file)"),
        (true, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read message file {}", path.display()))?,
        (false, None) => message.join(" "),
    };

    let body = body.trim();
    if body.is_empty() {
        bail!("Message text is empty");
    }
    Ok(body.to_string())
}

pub async fn schedule(
    store: &MessageStore,
    destination: &str,
    when: &str,
    message: &[String],
    file: Option<&Path>,
    output: &OutputControls,
) -> Result<()> {
    let destination = destination.trim();
    if destination.is_empty() {
        bail!("Destination is required");
    }

    let now = Utc::now();
    let scheduled_time = parse_when(when, now)?;
    let body = read_body(message, file).await?;

    let entry = ScheduledMessage::new(destination, body, scheduled_time, now);
    store
        .add_pending(entry.clone())
        .await
        .context("Failed to save scheduled message")?;

    if output.json {
        output.print(&entry);
    } else {
        println!(
            "Scheduled [{}] to {} at {}",
            entry.short_id(),
            entry.destination,
            entry.scheduled_time.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    Ok(())
}
