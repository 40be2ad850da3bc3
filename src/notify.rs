//! Completion and failure notifications
//!
//! Notifications are a fire-and-forget side channel. Delivery failures are
//! logged and swallowed; they must never fail the backup that triggered them.

use crate::config::{EmailConfig, NotificationConfig};
use crate::record::BackupRecord;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Failure,
}

/// One-shot message sent after a backup reaches a terminal state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationMessage {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    pub metadata: BackupRecord,
    pub timestamp: DateTime<Utc>,
}

impl NotificationMessage {
    pub fn success(record: &BackupRecord) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: format!(
                "Backup {} completed: {} tables, {} records, {} bytes",
                record.id,
                record.tables.len(),
                record.total_records(),
                record.size_bytes
            ),
            metadata: record.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn failure(record: &BackupRecord) -> Self {
        Self {
            kind: NotificationKind::Failure,
            message: format!(
                "Backup {} failed: {}",
                record.id,
                record.error.as_deref().unwrap_or("unknown error")
            ),
            metadata: record.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Dispatches notification messages to the configured targets
pub struct Notifier {
    config: NotificationConfig,
    http: Client,
}

impl Notifier {
    pub fn new(config: NotificationConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    /// Deliver to every configured target, logging failures at warn.
    pub async fn notify(&self, message: &NotificationMessage) {
        if self.config.email.is_none() && self.config.webhook_url.is_none() {
            debug!(backup_id = %message.metadata.id, "No notification targets configured");
            return;
        }

        if let Some(email) = &self.config.email {
            if let Err(e) = self.send_email(email, message).await {
                warn!(backup_id = %message.metadata.id, "Email notification failed: {}", e);
            }
        }

        if let Some(url) = &self.config.webhook_url {
            if let Err(e) = self.send_webhook(url, message).await {
                warn!(backup_id = %message.metadata.id, "Webhook notification failed: {}", e);
            }
        }
    }

    async fn send_email(&self, email: &EmailConfig, message: &NotificationMessage) -> Result<()> {
        let subject = format!(
            "[crmvault] {} backup {}",
            message.metadata.kind, message.metadata.status
        );
        let body = format!(
            "{}\n\n{}",
            message.message,
            serde_json::to_string_pretty(&message.metadata)?
        );

        let from = email.from.parse().map_err(|e| Error::Notification {
            reason: format!("invalid from address {}: {}", email.from, e),
        })?;

        let mut builder = Message::builder()
            .from(from)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);
        for to in &email.to {
            builder = builder.to(to.parse().map_err(|e| Error::Notification {
                reason: format!("invalid recipient address {}: {}", to, e),
            })?);
        }

        let mail = builder.body(body).map_err(|e| Error::Notification {
            reason: format!("failed to build email: {}", e),
        })?;

        let mut transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&email.smtp_host)
            .map_err(|e| Error::Notification {
                reason: format!("invalid SMTP relay {}: {}", email.smtp_host, e),
            })?
            .port(email.smtp_port);
        if let (Some(user), Some(pass)) = (&email.username, &email.password) {
            transport = transport.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        transport
            .build()
            .send(mail)
            .await
            .map_err(|e| Error::Notification {
                reason: format!("SMTP delivery failed: {}", e),
            })?;

        debug!(backup_id = %message.metadata.id, "Email notification sent");
        Ok(())
    }

    async fn send_webhook(&self, url: &str, message: &NotificationMessage) -> Result<()> {
        let response = self
            .http
            .post(url)
            .timeout(WEBHOOK_TIMEOUT)
            .json(message)
            .send()
            .await
            .map_err(|e| Error::Notification {
                reason: format!("webhook request failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(Error::Notification {
                reason: format!("webhook returned status {}", response.status()),
            });
        }

        debug!(backup_id = %message.metadata.id, "Webhook notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{BackupKind, BackupRecord};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_message_carries_type_field() {
        let mut record = BackupRecord::new(BackupKind::Full, "tester");
        record.mark_completed();

        let message = NotificationMessage::success(&record);
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["type"], "success");
        assert_eq!(json["metadata"]["status"], "completed");
        assert!(json["message"].as_str().unwrap().contains(&record.id));
    }

    #[test]
    fn test_failure_message_includes_error() {
        let mut record = BackupRecord::new(BackupKind::Full, "tester");
        record.mark_failed("disk full".to_string());

        let message = NotificationMessage::failure(&record);
        assert_eq!(message.kind, NotificationKind::Failure);
        assert!(message.message.contains("disk full"));
    }

    #[tokio::test]
    async fn test_notify_swallows_unreachable_webhook() {
        let config = NotificationConfig {
            email: None,
            // Discard port; connection is refused immediately.
            webhook_url: Some("http://127.0.0.1:9/hook".to_string()),
        };
        let notifier = Notifier::new(config);

        let record = BackupRecord::new(BackupKind::Full, "tester");
        notifier
            .notify(&NotificationMessage::success(&record))
            .await;
    }

    #[tokio::test]
    async fn test_notify_without_targets_is_a_noop() {
        let notifier = Notifier::new(NotificationConfig::default());
        let record = BackupRecord::new(BackupKind::Incremental, "tester");
        notifier
            .notify(&NotificationMessage::failure(&record))
            .await;
    }
}
