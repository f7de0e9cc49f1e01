//! Reply-draft construction.
//!
//! Pure logic: recipient math, subject prefixing, and the References
//! chain, assembled into a plain-text MIME message with lettre's builder.
//! The caller appends the result to a drafts folder.

use std::collections::HashSet;

use lettre::Message;
use lettre::message::{Mailbox, header::ContentType};
use mailgate_core::error::{MailgateError, Result};

use crate::session::{FullMessage, MailAddress};

/// A built draft, ready to append.
#[derive(Debug, Clone)]
pub struct ReplyDraft {
    pub message_id: String,
    /// Empty when the original carried no Message-ID.
    pub in_reply_to: String,
    pub to: Vec<MailAddress>,
    pub cc: Vec<MailAddress>,
    pub subject: String,
    pub mime: Vec<u8>,
}

/// Build a reply-all draft to `original`, authored by `owner`, with the
/// caller-supplied plain-text `body`.
pub fn build_reply(
    original: &FullMessage,
    owner: &str,
    body: &str,
    subject_prefix: Option<&str>,
) -> Result<ReplyDraft> {
    let (to, cc) = reply_recipients(original, owner);
    let subject = reply_subject(original.subject.as_deref().unwrap_or(""), subject_prefix);
    let message_id = draft_message_id(owner);

    let owner_mailbox: Mailbox = owner
        .parse()
        .map_err(|e| MailgateError::Mail(format!("Invalid owner address {owner}: {e}")))?;

    let mut builder = Message::builder()
        .from(owner_mailbox)
        .subject(subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .message_id(Some(message_id.clone()));

    for addr in &to {
        builder = builder.to(to_mailbox(addr)?);
    }
    for addr in &cc {
        builder = builder.cc(to_mailbox(addr)?);
    }

    let mut in_reply_to = String::new();
    if let Some(orig_id) = original.message_id.as_deref() {
        if !orig_id.trim().is_empty() {
            in_reply_to = orig_id.trim().to_string();
            builder = builder.in_reply_to(angle(&in_reply_to));
            // the reply's chain is the original's chain plus the original itself
            let chain: Vec<String> = original
                .references
                .iter()
                .map(|r| angle(r))
                .chain(std::iter::once(angle(&in_reply_to)))
                .collect();
            builder = builder.references(chain.join(" "));
        }
    }

    let message = builder
        .body(body.to_string())
        .map_err(|e| MailgateError::Mail(format!("Build reply: {e}")))?;

    Ok(ReplyDraft {
        message_id,
        in_reply_to,
        to,
        cc,
        subject,
        mime: message.formatted(),
    })
}

/// Reply-all recipient math: To = original sender plus every original To
/// recipient except the owner; Cc = original Cc minus the owner. All
/// comparisons case-insensitive; duplicates within a list collapse.
pub fn reply_recipients(
    original: &FullMessage,
    owner: &str,
) -> (Vec<MailAddress>, Vec<MailAddress>) {
    let owner_lower = owner.to_lowercase();
    let not_owner = |a: &&MailAddress| a.email.to_lowercase() != owner_lower;

    let mut seen = HashSet::new();
    let to: Vec<MailAddress> = original
        .from
        .iter()
        .chain(original.to.iter().filter(not_owner))
        .filter(|a| seen.insert(a.email.to_lowercase()))
        .cloned()
        .collect();

    let mut seen_cc = HashSet::new();
    let cc: Vec<MailAddress> = original
        .cc
        .iter()
        .filter(not_owner)
        .filter(|a| seen_cc.insert(a.email.to_lowercase()))
        .cloned()
        .collect();

    (to, cc)
}

/// Subjects already marked as replies pass through unchanged; everything
/// else gets the prefix (default `"Re: "`, custom prefixes normalized to
/// a single trailing space).
pub fn reply_subject(original_subject: &str, prefix: Option<&str>) -> String {
    let already_reply = original_subject
        .get(..3)
        .is_some_and(|head| head.eq_ignore_ascii_case("re:"));
    if already_reply {
        return original_subject.to_string();
    }

    let prefix = match prefix {
        Some(p) if !p.trim().is_empty() => format!("{} ", p.trim()),
        _ => "Re: ".to_string(),
    };
    format!("{prefix}{original_subject}")
}

/// Message ids travel without angle brackets internally (the parser
/// strips them); wire headers need them back.
fn angle(id: &str) -> String {
    let id = id.trim();
    if id.starts_with('<') {
        id.to_string()
    } else {
        format!("<{id}>")
    }
}

fn to_mailbox(addr: &MailAddress) -> Result<Mailbox> {
    let address: lettre::Address = addr
        .email
        .parse()
        .map_err(|e| MailgateError::Mail(format!("Invalid recipient {}: {e}", addr.email)))?;
    Ok(Mailbox::new(addr.name.clone(), address))
}

/// Message-ID for a freshly built draft: timestamp-hex local part, the
/// owner's domain.
fn draft_message_id(owner: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let domain = owner
        .split_once('@')
        .map(|(_, d)| d)
        .filter(|d| !d.is_empty())
        .unwrap_or("mailgate.local");
    format!("<mailgate-{:x}-{:x}@{}>", t.as_secs(), t.subsec_nanos(), domain)
}
