//! Permanent-failure notification sinks.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation (Claude)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, error, info, warn};

use super::NotificationSink;
use crate::config::EmailConfig;
use crate::error::{Result, SchedulerError};
use crate::types::ScheduledMessage;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Subject and plain-text body describing a permanently failed message.
pub fn failure_report(message: &ScheduledMessage, failed_at: DateTime<Utc>) -> (String, String) {
    let subject = format!("Scheduled message failed - ID: {}", message.short_id());
    let text = format!(
        "A scheduled message has permanently failed after {retries} retry attempts.

Message Details:
- ID: {id}
- Destination: {destination}
- Scheduled Time: {scheduled}
- Message: \"{body}\"

Failure Details:
- Retry Attempts: {retries}
- Last Error: {last_error}
- Final Failure Time: {failed_at}

The message remains in scheduled.json with status 'failed'.
View it with: wolfies-scheduler list --failed",
        retries = message.retry_count,
        id = message.id,
        destination = message.destination,
        scheduled = message.scheduled_time.format(TIME_FORMAT),
        body = message.body,
        last_error = message.last_error.as_deref().unwrap_or("Unknown error"),
        failed_at = failed_at.format(TIME_FORMAT),
    );
    (subject, text)
}

/// Writes failure reports to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, failed: &ScheduledMessage) {
        let (subject, text) = failure_report(failed, Utc::now());
        error!(id = %failed.id, subject = %subject, "{}", text);
    }
}

/// Emails failure reports over SMTP.
#[derive(Debug, Clone)]
pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    async fn send_report(&self, failed: &ScheduledMessage) -> Result<()> {
        let cfg = &self.config;
        let (Some(host), Some(user), Some(pass), Some(from), Some(to)) = (
            cfg.host.as_deref(),
            cfg.user.as_deref(),
            cfg.pass.as_deref(),
            cfg.from.as_deref(),
            cfg.to.as_deref(),
        ) else {
            return Err(SchedulerError::Notification(
                "email configuration incomplete".to_string(),
            ));
        };

        let (subject, text) = failure_report(failed, Utc::now());
        let from: Mailbox = from
            .parse()
            .map_err(|e| SchedulerError::Notification(format!("invalid EMAIL_FROM: {}", e)))?;
        let to: Mailbox = to
            .parse()
            .map_err(|e| SchedulerError::Notification(format!("invalid EMAIL_TO: {}", e)))?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .body(text)
            .map_err(|e| SchedulerError::Notification(e.to_string()))?;

        let builder = if cfg.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }
        .map_err(|e| SchedulerError::Notification(e.to_string()))?;

        let mailer = builder
            .port(cfg.port)
            .credentials(Credentials::new(user.to_string(), pass.to_string()))
            .build();

        mailer
            .send(email)
            .await
            .map_err(|e| SchedulerError::Notification(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for EmailNotifier {
    async fn notify(&self, failed: &ScheduledMessage) {
        if !self.config.enabled {
            debug!("Email notifications disabled, skipping notification");
            return;
        }
        if !self.config.is_complete() {
            warn!("Email notifications enabled but configuration incomplete, skipping notification");
            return;
        }

        match self.send_report(failed).await {
            Ok(()) => info!(id = %failed.id, "Failure notification email sent"),
            Err(e) => error!(id = %failed.id, error = %e, "Failed to send email notification"),
        }
    }
}
