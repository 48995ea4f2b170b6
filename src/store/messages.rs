//! Pending queue (`scheduled.json`) and sent history (`sent.json`).
//!
//! Every operation loads the whole collection, mutates it in memory and saves
//! it back. There is no row-level update and no cross-process lock: two
//! processes racing on the same file resolve as last writer wins.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation (Claude)

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::atomic;
use crate::error::Result;
use crate::types::{MessageUpdate, ScheduledMessage, SentMessage};

pub const SCHEDULED_FILE: &str = "scheduled.json";
pub const SENT_FILE: &str = "sent.json";

/// On-disk wrapper: `{ "messages": [...] }`.
#[derive(Debug, Serialize, Deserialize)]
struct MessagesFile<T> {
    messages: Vec<T>,
}

impl<T> Default for MessagesFile<T> {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
        }
    }
}

/// Result of resolving an id prefix against the pending queue.
#[derive(Debug, PartialEq)]
pub enum PrefixMatch {
    None,
    One(ScheduledMessage),
    Ambiguous(usize),
}

/// File-backed message collections in one data directory.
#[derive(Debug, Clone)]
pub struct MessageStore {
    scheduled_path: PathBuf,
    sent_path: PathBuf,
}

impl MessageStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self {
            scheduled_path: dir.join(SCHEDULED_FILE),
            sent_path: dir.join(SENT_FILE),
        }
    }

    pub fn scheduled_path(&self) -> &Path {
        &self.scheduled_path
    }

    pub fn sent_path(&self) -> &Path {
        &self.sent_path
    }

    // ========================================================================
    // Pending queue
    // ========================================================================

    /// Load the whole pending queue (empty if absent or corrupt).
    pub async fn list_pending(&self) -> Result<Vec<ScheduledMessage>> {
        let file: MessagesFile<ScheduledMessage> =
            atomic::read_json_or_default(&self.scheduled_path).await?;
        Ok(file.messages)
    }

    /// Replace the whole pending queue.
    pub async fn save_pending(&self, messages: Vec<ScheduledMessage>) -> Result<()> {
        atomic::write_json(&self.scheduled_path, &MessagesFile { messages }).await
    }

    pub async fn add_pending(&self, message: ScheduledMessage) -> Result<()> {
        let mut messages = self.list_pending().await?;
        let id = message.id.clone();
        messages.push(message);
        self.save_pending(messages).await?;
        info!(id = %id, "Added scheduled message");
        Ok(())
    }

    /// Remove by id. Returns `false` when the id is unknown.
    pub async fn remove_pending(&self, id: &str) -> Result<bool> {
        let mut messages = self.list_pending().await?;
        let before = messages.len();
        messages.retain(|m| m.id != id);

        if messages.len() == before {
            return Ok(false);
        }

        self.save_pending(messages).await?;
        info!(id = %id, "Removed scheduled message");
        Ok(true)
    }

    /// Apply a partial update by id. Returns `false` when the id is unknown.
    pub async fn update_pending(&self, id: &str, update: MessageUpdate) -> Result<bool> {
        let mut messages = self.list_pending().await?;
        let Some(message) = messages.iter_mut().find(|m| m.id == id) else {
            return Ok(false);
        };

        update.apply(message);
        self.save_pending(messages).await?;
        info!(id = %id, "Updated scheduled message");
        Ok(true)
    }

    pub async fn find_pending(&self, id: &str) -> Result<Option<ScheduledMessage>> {
        let messages = self.list_pending().await?;
        Ok(messages.into_iter().find(|m| m.id == id))
    }

    /// Resolve a full id or a unique id prefix.
    pub async fn find_pending_by_prefix(&self, prefix: &str) -> Result<PrefixMatch> {
        let mut matches: Vec<ScheduledMessage> = self
            .list_pending()
            .await?
            .into_iter()
            .filter(|m| m.id.starts_with(prefix))
            .collect();

        if let Some(exact) = matches.iter().position(|m| m.id == prefix) {
            return Ok(PrefixMatch::One(matches.swap_remove(exact)));
        }

        Ok(match matches.len() {
            0 => PrefixMatch::None,
            1 => PrefixMatch::One(matches.remove(0)),
            n => PrefixMatch::Ambiguous(n),
        })
    }

    // ========================================================================
    // Sent history
    // ========================================================================

    pub async fn list_sent(&self) -> Result<Vec<SentMessage>> {
        let file: MessagesFile<SentMessage> = atomic::read_json_or_default(&self.sent_path).await?;
        Ok(file.messages)
    }

    pub async fn add_sent(&self, message: SentMessage) -> Result<()> {
        let mut messages = self.list_sent().await?;
        let id = message.id.clone();
        messages.push(message);
        atomic::write_json(&self.sent_path, &MessagesFile { messages }).await?;
        info!(id = %id, "Added sent message to history");
        Ok(())
    }

    /// Move a pending entry into sent history.
    ///
    /// History is written first, then the pending entry removed. A crash in
    /// between leaves the id in both files; the next successful save of the
    /// pending queue does not repair that.
    pub async fn move_to_sent(&self, message: ScheduledMessage, sent_at: DateTime<Utc>) -> Result<()> {
        let id = message.id.clone();
        self.add_sent(message.into_sent(sent_at)).await?;
        self.remove_pending(&id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageStatus;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn message(body: &str) -> ScheduledMessage {
        ScheduledMessage::new("+14155551234", body, at(2_000), at(1_000))
    }

    #[tokio::test]
    async fn test_add_find_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = MessageStore::new(dir.path());

        let msg = message("hello");
        let id = msg.id.clone();
        store.add_pending(msg.clone()).await.unwrap();

        assert_eq!(store.find_pending(&id).await.unwrap(), Some(msg));
        assert!(store.remove_pending(&id).await.unwrap());
        assert!(!store.remove_pending(&id).await.unwrap());
        assert!(store.find_pending(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = MessageStore::new(dir.path());
        let found = store
            .update_pending("missing", MessageUpdate::default())
            .await
            .unwrap();
        assert!(!found);
        // Nothing was written for an unknown id.
        assert!(!store.scheduled_path().exists());
    }

    #[tokio::test]
    async fn test_update_pending_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = MessageStore::new(dir.path());
        let msg = message("hello");
        let id = msg.id.clone();
        store.add_pending(msg).await.unwrap();

        let update = MessageUpdate {
            status: Some(MessageStatus::Failed),
            last_error: Some("boom".to_string()),
            ..Default::default()
        };
        assert!(store.update_pending(&id, update).await.unwrap());

        let stored = store.find_pending(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Failed);
        assert_eq!(stored.last_error.as_deref(), Some("boom"));
        assert_eq!(stored.body, "hello");
    }

    #[tokio::test]
    async fn test_move_to_sent() {
        let dir = tempfile::tempdir().unwrap();
        let store = MessageStore::new(dir.path());
        let msg = message("hello");
        let id = msg.id.clone();
        store.add_pending(msg.clone()).await.unwrap();

        store.move_to_sent(msg, at(2_010)).await.unwrap();

        assert!(store.list_pending().await.unwrap().is_empty());
        let sent = store.list_sent().await.unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, id);
        assert_eq!(sent[0].created_at, at(1_000));
        assert_eq!(sent[0].sent_at, at(2_010));
    }

    #[tokio::test]
    async fn test_prefix_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let store = MessageStore::new(dir.path());

        let mut a = message("a");
        a.id = "abcd1111-0000".to_string();
        let mut b = message("b");
        b.id = "abcd2222-0000".to_string();
        store.save_pending(vec![a.clone(), b]).await.unwrap();

        assert_eq!(
            store.find_pending_by_prefix("abcd").await.unwrap(),
            PrefixMatch::Ambiguous(2)
        );
        assert_eq!(
            store.find_pending_by_prefix("abcd1").await.unwrap(),
            PrefixMatch::One(a)
        );
        assert_eq!(
            store.find_pending_by_prefix("ffff").await.unwrap(),
            PrefixMatch::None
        );
    }

    #[tokio::test]
    async fn test_corrupt_queue_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MessageStore::new(dir.path());
        std::fs::write(store.scheduled_path(), "[[[").unwrap();

        assert!(store.list_pending().await.unwrap().is_empty());
        // The reset file is valid and accepts new entries.
        store.add_pending(message("after")).await.unwrap();
        assert_eq!(store.list_pending().await.unwrap().len(), 1);
    }
}
