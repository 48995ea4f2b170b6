//! Atomic JSON file primitives with corruption recovery.
//!
//! Writes go to `<path>.tmp` and are renamed into place, so a reader never
//! observes a half-written file. A file that exists but fails to parse is
//! copied to `<path>.backup.<unix-millis>` and replaced by the default value.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation (Claude)

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{Result, SchedulerError};

/// Temp path used while writing `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Backup path for a corrupt `path`.
pub fn backup_path(path: &Path, millis: i64) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".backup.{}", millis));
    PathBuf::from(name)
}

/// Serialize `value` to `path` atomically.
///
/// On any failure the temp file is removed and the error is returned; the
/// previous contents of `path` are left unchanged.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = temp_path(path);

    let result = async {
        let json = serde_json::to_string_pretty(value)?;
        tokio::fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|e| SchedulerError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| SchedulerError::io(path, e))
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}

/// Read raw file contents, `None` when the file does not exist.
async fn read_if_exists(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SchedulerError::io(path, e)),
    }
}

/// Load a collection file, recovering from corruption.
///
/// Absent file: returns `T::default()`. Unparsable file: backs it up, resets
/// it to the default and returns the default. Corruption is never an error;
/// only an unreadable file (permissions, I/O) is.
pub async fn read_json_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Serialize + Default,
{
    let content = match read_if_exists(path).await? {
        Some(content) => content,
        None => return Ok(T::default()),
    };

    match serde_json::from_str::<T>(&content) {
        Ok(value) => Ok(value),
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to parse store file, using empty default");
            let empty = T::default();
            recover_corrupt(path, &empty).await;
            Ok(empty)
        }
    }
}

/// Back up a corrupt file and reset it to the default contents.
async fn recover_corrupt<T: Serialize>(path: &Path, empty: &T) {
    let backup = backup_path(path, chrono::Utc::now().timestamp_millis());
    match tokio::fs::copy(path, &backup).await {
        Ok(_) => info!(backup = %backup.display(), "Backed up corrupted file"),
        Err(e) => {
            // Keep the corrupt original in place when it could not be preserved.
            warn!(path = %path.display(), error = %e, "Failed to back up corrupted file");
            return;
        }
    }

    if let Err(e) = write_json(path, empty).await {
        warn!(path = %path.display(), error = %e, "Failed to reset corrupted file");
    }
}

/// Load a single-record file. Absent or unparsable files yield `None`.
pub async fn read_json_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match read_if_exists(path).await? {
        Some(content) => content,
        None => return Ok(None),
    };

    match serde_json::from_str::<T>(&content) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to parse record file");
            Ok(None)
        }
    }
}

/// Remove a file; a missing file is not an error.
pub async fn remove_if_exists(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(SchedulerError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Doc {
        messages: Vec<u32>,
    }

    fn backups_in(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".backup."))
            .count()
    }

    #[test]
    fn test_temp_and_backup_paths() {
        let path = Path::new("/data/scheduled.json");
        assert_eq!(temp_path(path), PathBuf::from("/data/scheduled.json.tmp"));
        assert_eq!(
            backup_path(path, 1700000000000),
            PathBuf::from("/data/scheduled.json.backup.1700000000000")
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let doc: Doc = read_json_or_default(&dir.path().join("x.json")).await.unwrap();
        assert_eq!(doc, Doc::default());
        assert_eq!(backups_in(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.json");
        write_json(&path, &Doc { messages: vec![1, 2] }).await.unwrap();
        let doc: Doc = read_json_or_default(&path).await.unwrap();
        assert_eq!(doc.messages, vec![1, 2]);
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_backed_up_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.json");
        std::fs::write(&path, "{ not json").unwrap();

        let doc: Doc = read_json_or_default(&path).await.unwrap();
        assert_eq!(doc, Doc::default());
        assert_eq!(backups_in(dir.path()), 1);

        let again: Doc = read_json_or_default(&path).await.unwrap();
        assert_eq!(again, Doc::default());
        assert_eq!(backups_in(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_target_untouched() {
        let dir = tempfile::tempdir().unwrap();
        // Renaming a file over a non-empty directory fails.
        let path = dir.path().join("target");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        let result = write_json(&path, &Doc::default()).await;
        assert!(result.is_err());
        assert!(!temp_path(&path).exists());
        assert!(path.join("keep").exists());
    }

    #[tokio::test]
    async fn test_optional_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.json");
        let none: Option<Doc> = read_json_optional(&path).await.unwrap();
        assert!(none.is_none());

        std::fs::write(&path, "garbage").unwrap();
        let bad: Option<Doc> = read_json_optional(&path).await.unwrap();
        assert!(bad.is_none());
        assert_eq!(backups_in(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_remove_if_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.json");
        assert!(!remove_if_exists(&path).await.unwrap());
        std::fs::write(&path, "{}").unwrap();
        assert!(remove_if_exists(&path).await.unwrap());
    }
}
