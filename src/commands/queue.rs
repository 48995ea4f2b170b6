//! Queue commands: list, delete.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation (Claude)

use anyhow::{bail, Context, Result};

use crate::output::OutputControls;
use crate::store::{MessageStore, PrefixMatch};
use crate::types::MessageStatus;

/// Which collection `list` shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    /// Pending and failed queue entries
    Queue,
    Pending,
    Failed,
    Sent,
}

pub async fn list(store: &MessageStore, filter: ListFilter, output: &OutputControls) -> Result<()> {
    if filter == ListFilter::Sent {
        let sent = store.list_sent().await.context("Failed to load sent history")?;
        if output.json {
            output.print(&sent);
            return Ok(());
        }
        if sent.is_empty() {
            println!("No sent messages.");
            return Ok(());
        }
        println!("Sent Messages ({}):", sent.len());
        println!("{}", "-".repeat(60));
        for msg in &sent {
            println!(
                "[{}] {} -> {}: {}",
                msg.short_id(),
                msg.sent_at.format("%Y-%m-%d %H:%M UTC"),
                msg.destination,
                output.preview(&msg.body)
            );
        }
        return Ok(());
    }

    let messages: Vec<_> = store
        .list_pending()
        .await
        .context("Failed to load scheduled messages")?
        .into_iter()
        .filter(|m| match filter {
            ListFilter::Pending => m.status == MessageStatus::Pending,
            ListFilter::Failed => m.status == MessageStatus::Failed,
            _ => true,
        })
        .collect();

    if output.json {
        output.print(&messages);
        return Ok(());
    }

    if messages.is_empty() {
        println!("No scheduled messages.");
        return Ok(());
    }

    println!("Scheduled Messages ({}):", messages.len());
    println!("{}", "-".repeat(60));
    for msg in &messages {
        let status = match msg.status {
            MessageStatus::Pending if msg.retry_count > 0 => format!("pending, retry {}", msg.retry_count),
            MessageStatus::Pending => "pending".to_string(),
            MessageStatus::Failed => "failed".to_string(),
        };
        println!(
            "[{}] {} -> {} ({}): {}",
            msg.short_id(),
            msg.scheduled_time.format("%Y-%m-%d %H:%M UTC"),
            msg.destination,
            status,
            output.preview(&msg.body)
        );
        if let Some(ref err) = msg.last_error {
            println!("    {}", err);
        }
    }

    Ok(())
}

/// Remove one pending entry by full id or unique prefix.
pub async fn delete(store: &MessageStore, id_or_prefix: &str, output: &OutputControls) -> Result<()> {
    let prefix = id_or_prefix.trim();
    if prefix.is_empty() {
        bail!("Message id is required");
    }

    let message = match store.find_pending_by_prefix(prefix).await? {
        PrefixMatch::One(message) => message,
        PrefixMatch::None => bail!("No scheduled message matches '{}'", prefix),
        PrefixMatch::Ambiguous(n) => {
            bail!("'{}' matches {} messages; use a longer id", prefix, n)
        }
    };

    if !store.remove_pending(&message.id).await? {
        bail!("Message {} was removed by another process", message.short_id());
    }

    if output.json {
        output.print(&serde_json::json!({
            "success": true,
            "deleted": message.id,
        }));
    } else {
        println!("Deleted [{}] to {}", message.short_id(), message.destination);
    }
    Ok(())
}
