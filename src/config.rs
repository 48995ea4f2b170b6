//! Runtime configuration loaded from environment variables.
//!
//! CHANGELOG:
//! - 10/19/2026 - Data directory is always absolute (Claude)
//! - 10/19/2026 - Initial implementation (Claude)

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SchedulerError};

pub const DATA_DIR_ENV: &str = "WOLFIES_SCHEDULER_DATA_DIR";
pub const CHECK_INTERVAL_ENV: &str = "WOLFIES_SCHEDULER_CHECK_INTERVAL";
pub const LOG_LEVEL_ENV: &str = "WOLFIES_SCHEDULER_LOG_LEVEL";

const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;
const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP settings for failure notifications.
#[derive(Debug, Clone, Default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub host: Option<String>,
    pub port: u16,
    /// Implicit TLS instead of STARTTLS
    pub secure: bool,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl EmailConfig {
    /// True when every field needed to send is present.
    pub fn is_complete(&self) -> bool {
        self.host.is_some()
            && self.user.is_some()
            && self.pass.is_some()
            && self.from.is_some()
            && self.to.is_some()
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Scheduler poll period
    pub check_interval: Duration,
    pub log_level: String,
    pub email: EmailConfig,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup(DATA_DIR_ENV)
            .filter(|s| !s.trim().is_empty())
            .map(|s| expand_dir(&s))
            .unwrap_or_else(default_data_dir);

        let check_interval_secs = parse_number(lookup(CHECK_INTERVAL_ENV), DEFAULT_CHECK_INTERVAL_SECS);
        let check_interval_secs = if check_interval_secs == 0 {
            DEFAULT_CHECK_INTERVAL_SECS
        } else {
            check_interval_secs
        };

        let email = EmailConfig {
            enabled: parse_bool(lookup("WOLFIES_SCHEDULER_EMAIL_ENABLED"), false),
            host: lookup("SMTP_HOST"),
            port: parse_number(lookup("SMTP_PORT"), DEFAULT_SMTP_PORT),
            secure: parse_bool(lookup("SMTP_SECURE"), false),
            user: lookup("SMTP_USER"),
            pass: lookup("SMTP_PASS"),
            from: lookup("EMAIL_FROM"),
            to: lookup("EMAIL_TO"),
        };

        Self {
            data_dir,
            check_interval: Duration::from_secs(check_interval_secs),
            log_level: lookup(LOG_LEVEL_ENV).unwrap_or_else(|| "info".to_string()),
            email,
        }
    }

    /// Replace the data directory (CLI `--data-dir`).
    pub fn with_data_dir(mut self, dir: impl AsRef<str>) -> Self {
        self.data_dir = expand_dir(dir.as_ref());
        self
    }

    pub fn pid_file(&self) -> PathBuf {
        self.data_dir.join("daemon.pid")
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("daemon.log")
    }

    /// Create the data directory if it is missing.
    pub fn ensure_data_dir(&self) -> Result<&Path> {
        std::fs::create_dir_all(&self.data_dir)
            .map_err(|e| SchedulerError::io(&self.data_dir, e))?;
        Ok(&self.data_dir)
    }
}

/// Default data directory: `~/.wolfies-scheduler`.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wolfies-scheduler")
}

/// Expand `~` and anchor relative paths at the current directory, so the
/// path survives the daemon's change of working directory.
fn expand_dir(raw: &str) -> PathBuf {
    let path = PathBuf::from(shellexpand::tilde(raw).to_string());
    std::path::absolute(&path).unwrap_or(path)
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    match value {
        Some(v) if !v.is_empty() => v.eq_ignore_ascii_case("true"),
        _ => default,
    }
}

fn parse_number<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
