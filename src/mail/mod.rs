//! Mail collaborator
//!
//! The worker sends email through the [`EmailSender`] trait. Production uses
//! [`ApiMailer`], an HTTP JSON client for a mail-API endpoint; tests use
//! [`MemorySender`], which records outgoing messages.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use tracing::debug;

use crate::config::MailConfig;
use crate::error::CoreError;

#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver one email. Any error is retryable from the caller's point of
    /// view; delivery may therefore happen more than once for the same
    /// logical message.
    async fn send_email(
        &self,
        subject: &str,
        html_body: &str,
        to: &[String],
        attach_files: &[PathBuf],
    ) -> Result<(), CoreError>;
}

#[derive(Serialize)]
struct OutboundAttachment {
    filename: String,
    /// base64-encoded file content
    content: String,
}

#[derive(Serialize)]
struct OutboundMessage<'a> {
    from: String,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
    attachments: Vec<OutboundAttachment>,
}

/// HTTP mail-API client.
pub struct ApiMailer {
    client: reqwest::Client,
    config: MailConfig,
}

impl ApiMailer {
    pub fn new(config: MailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn load_attachment(path: &Path) -> Result<OutboundAttachment, CoreError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| CoreError::MailDelivery(format!("cannot read attachment {path:?}: {e}")))?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());

        Ok(OutboundAttachment {
            filename,
            content: BASE64.encode(bytes),
        })
    }
}

#[async_trait]
impl EmailSender for ApiMailer {
    async fn send_email(
        &self,
        subject: &str,
        html_body: &str,
        to: &[String],
        attach_files: &[PathBuf],
    ) -> Result<(), CoreError> {
        let mut attachments = Vec::with_capacity(attach_files.len());
        for path in attach_files {
            attachments.push(Self::load_attachment(path).await?);
        }

        let message = OutboundMessage {
            from: format!("{} <{}>", self.config.sender_name, self.config.sender_address),
            to,
            subject,
            html: html_body,
            attachments,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_token)
            .json(&message)
            .send()
            .await
            .map_err(|e| CoreError::MailDelivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::MailDelivery(format!(
                "mail api returned {}",
                response.status()
            )));
        }

        debug!(subject, recipients = to.len(), "email accepted by mail api");
        Ok(())
    }
}

/// Recorded copy of an outgoing email.
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub subject: String,
    pub html_body: String,
    pub to: Vec<String>,
    pub attach_files: Vec<PathBuf>,
}

/// In-memory sender for tests; records every message instead of sending.
#[derive(Default)]
pub struct MemorySender {
    sent: Mutex<Vec<SentEmail>>,
}

impl MemorySender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().expect("mail mutex poisoned").clone()
    }
}

#[async_trait]
impl EmailSender for MemorySender {
    async fn send_email(
        &self,
        subject: &str,
        html_body: &str,
        to: &[String],
        attach_files: &[PathBuf],
    ) -> Result<(), CoreError> {
        self.sent.lock().expect("mail mutex poisoned").push(SentEmail {
            subject: subject.to_string(),
            html_body: html_body.to_string(),
            to: to.to_vec(),
            attach_files: attach_files.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sender_records_messages() {
        let sender = MemorySender::new();
        sender
            .send_email(
                "A test email",
                "<h1>Hello</h1>",
                &["someone@email.com".to_string()],
                &[],
            )
            .await
            .expect("should record");

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "A test email");
        assert_eq!(sent[0].to, vec!["someone@email.com"]);
    }
}
