//! Delivery Notifier boundary.
//!
//! The rest of the crate only builds [`OutgoingMail`] values; transports live
//! behind [`Mailer`].

mod smtp;

pub use smtp::SmtpMailer;

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address: {0}")]
    Address(String),
    #[error("Failed to build message: {0}")]
    Build(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl MailAttachment {
    pub fn pdf(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: "application/pdf".to_string(),
            content,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
    pub attachments: Vec<MailAttachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    fn transport_tag(&self) -> &'static str;

    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Logs instead of sending. Used when no SMTP host is configured.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    fn transport_tag(&self) -> &'static str {
        "log"
    }

    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let attachments: Vec<&str> = mail.attachments.iter().map(|a| a.filename.as_str()).collect();
        info!(
            to = %mail.to,
            subject = %mail.subject,
            ?attachments,
            "Mail not sent (no SMTP transport configured)"
        );
        Ok(())
    }
}

/// Keeps every delivered message in memory; addresses in `fail_for` are
/// refused with a transport error.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    fail_for: HashSet<String>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_for: addresses.into_iter().map(Into::into).collect(),
        }
    }

    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    fn transport_tag(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        if self.fail_for.contains(&mail.to) {
            return Err(MailError::Transport(format!("mailbox {} refused", mail.to)));
        }
        self.sent.lock().await.push(mail);
        Ok(())
    }
}
