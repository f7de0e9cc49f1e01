//! # Mailgate IMAP
//!
//! Everything that touches the mailbox: the [`session::MailSession`] seam
//! over raw IMAP operations, the production async-imap implementation,
//! reply-draft construction, and the [`coordinator::ScanCoordinator`] that
//! turns raw message summaries into classified alerts.

pub mod client;
pub mod coordinator;
pub mod reply;
pub mod session;

pub use client::ImapConnector;
pub use coordinator::{DraftReceipt, ScanCoordinator};
pub use reply::{ReplyDraft, build_reply};
pub use session::{FullMessage, MailAddress, MailConnector, MailSession, MessageSummary};
