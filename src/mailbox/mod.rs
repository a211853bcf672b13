//! Mailbox gateway: IMAP fetch for inbound inquiries, SMTP via lettre
//! for outbound replies.
//!
//! The pipeline depends only on the [`Mailbox`] trait. The concrete
//! gateway never marks a message `\Seen` during fetch; marking is an
//! explicit `mark_handled` call issued by the dispatcher after a
//! successful send (or by the pipeline for skipped messages).

mod imap;
mod smtp;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::MailConfig;
use crate::error::MailboxError;

/// An inbound message as fetched from the mailbox. Immutable; lives for
/// one pipeline pass.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Mailbox-native stable id (IMAP UID).
    pub id: String,
    pub subject: String,
    pub body: String,
    pub from: String,
    /// Canonical date string derived from the Date header; part of the
    /// dedup fingerprint, so it must be stable across repeated fetches.
    pub date: String,
    /// Parsed receive time for logging and metrics.
    pub received_at: DateTime<Utc>,
}

/// Narrow mailbox interface the pipeline is written against.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Fetch unseen messages addressed to the configured alias.
    async fn list_candidates(&self) -> Result<Vec<RawMessage>, MailboxError>;

    /// Mark a message as handled so later polls skip it.
    async fn mark_handled(&self, id: &str) -> Result<(), MailboxError>;

    /// Send a reply.
    async fn send_reply(&self, to: &str, subject: &str, body: &str)
        -> Result<(), MailboxError>;
}

/// Production gateway: IMAP-over-TLS inbound, SMTP (STARTTLS) outbound.
pub struct ImapSmtpMailbox {
    config: MailConfig,
}

impl ImapSmtpMailbox {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailbox for ImapSmtpMailbox {
    async fn list_candidates(&self) -> Result<Vec<RawMessage>, MailboxError> {
        let cfg = self.config.clone();
        tokio::task::spawn_blocking(move || imap::fetch_unseen(&cfg))
            .await
            .map_err(|e| MailboxError::TaskPanic(e.to_string()))?
    }

    async fn mark_handled(&self, id: &str) -> Result<(), MailboxError> {
        let cfg = self.config.clone();
        let uid = id.to_string();
        tokio::task::spawn_blocking(move || imap::mark_seen(&cfg, &uid))
            .await
            .map_err(|e| MailboxError::TaskPanic(e.to_string()))?
    }

    async fn send_reply(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), MailboxError> {
        let cfg = self.config.clone();
        let (to, subject, body) = (to.to_string(), subject.to_string(), body.to_string());
        tokio::task::spawn_blocking(move || smtp::send(&cfg, &to, &subject, &body))
            .await
            .map_err(|e| MailboxError::TaskPanic(e.to_string()))?
    }
}
