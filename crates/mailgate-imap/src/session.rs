//! The mail-access seam.
//!
//! The coordinator never talks IMAP directly — it drives a [`MailSession`],
//! obtained from a [`MailConnector`] at the start of each scan or draft
//! operation and released at the end. Connections are never held across
//! cycles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailgate_core::Result;

/// One mailbox participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAddress {
    pub name: Option<String>,
    pub email: String,
}

impl MailAddress {
    pub fn new(name: Option<&str>, email: &str) -> Self {
        Self {
            name: name.map(str::to_string),
            email: email.to_string(),
        }
    }

    /// RFC-style rendering: `Name <email>` when a display name exists.
    pub fn display(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => format!("{} <{}>", name.trim(), self.email),
            _ => self.email.clone(),
        }
    }
}

/// Envelope-level metadata for one message in the scan window.
#[derive(Debug, Clone, Default)]
pub struct MessageSummary {
    /// Session-scoped sequence number.
    pub seq: u32,
    pub message_id: Option<String>,
    pub from: Option<MailAddress>,
    pub subject: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// A fully fetched message, reduced to what the pipeline needs.
#[derive(Debug, Clone, Default)]
pub struct FullMessage {
    pub message_id: Option<String>,
    pub subject: Option<String>,
    pub body_text: Option<String>,
    /// Message-IDs from the References header, angle brackets stripped.
    pub references: Vec<String>,
    pub from: Vec<MailAddress>,
    pub to: Vec<MailAddress>,
    pub cc: Vec<MailAddress>,
}

/// One authenticated mailbox session.
#[async_trait]
pub trait MailSession: Send {
    /// Open the inbox read-only; returns the message count.
    async fn open_inbox(&mut self) -> Result<u32>;

    /// Envelope summaries for the sequence range `start..=end`,
    /// oldest first.
    async fn fetch_summaries(&mut self, start: u32, end: u32) -> Result<Vec<MessageSummary>>;

    /// The complete message at `seq`.
    async fn fetch_full(&mut self, seq: u32) -> Result<FullMessage>;

    /// Sequence numbers of inbox messages sent by `sender` whose
    /// Message-ID appears among `references`.
    async fn search_sender_in_references(
        &mut self,
        sender: &str,
        references: &[String],
    ) -> Result<Vec<u32>>;

    /// The folder the server advertises with the `\Drafts` special-use
    /// attribute, if any.
    async fn drafts_special_folder(&mut self) -> Result<Option<String>>;

    /// Store `mime` in `folder` as an unsent draft.
    async fn append_draft(&mut self, folder: &str, mime: &[u8]) -> Result<()>;

    async fn logout(&mut self) -> Result<()>;
}

/// Produces a fresh [`MailSession`] per operation.
#[async_trait]
pub trait MailConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn MailSession>>;
}
