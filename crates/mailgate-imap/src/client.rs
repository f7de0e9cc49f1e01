//! Production [`MailSession`] over async-imap.
//!
//! A session is created per operation: TCP connect, optional TLS wrap,
//! LOGIN, work, LOGOUT. The session type is generic over the underlying
//! stream so the TLS and plaintext paths share one implementation.

use async_trait::async_trait;
use futures::StreamExt;
use mail_parser::{HeaderValue, MessageParser};
use mailgate_core::config::ImapConfig;
use mailgate_core::error::{MailgateError, Result};

use crate::session::{FullMessage, MailAddress, MailConnector, MailSession, MessageSummary};

/// Connects authenticated IMAP sessions from config.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    config: ImapConfig,
}

impl ImapConnector {
    pub fn new(config: ImapConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailConnector for ImapConnector {
    async fn connect(&self) -> Result<Box<dyn MailSession>> {
        let cfg = &self.config;
        let tcp = tokio::net::TcpStream::connect((cfg.host.as_str(), cfg.port))
            .await
            .map_err(|e| MailgateError::Mail(format!("TCP connect: {e}")))?;

        if cfg.use_tls {
            let connector = native_tls::TlsConnector::new()
                .map_err(|e| MailgateError::Mail(format!("TLS connector: {e}")))?;
            let connector = tokio_native_tls::TlsConnector::from(connector);
            let tls = connector
                .connect(&cfg.host, tcp)
                .await
                .map_err(|e| MailgateError::Mail(format!("TLS handshake: {e}")))?;
            let session = login(async_imap::Client::new(tls), cfg).await?;
            Ok(Box::new(ImapSession {
                session,
                inbox: cfg.inbox.clone(),
            }))
        } else {
            let session = login(async_imap::Client::new(tcp), cfg).await?;
            Ok(Box::new(ImapSession {
                session,
                inbox: cfg.inbox.clone(),
            }))
        }
    }
}

async fn login<S>(client: async_imap::Client<S>, cfg: &ImapConfig) -> Result<async_imap::Session<S>>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + std::fmt::Debug,
{
    client
        .login(&cfg.username, &cfg.password)
        .await
        .map_err(|e| MailgateError::Mail(format!("IMAP login: {}", e.0)))
}

/// One live IMAP session bound to a configured inbox.
pub struct ImapSession<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + std::fmt::Debug,
{
    session: async_imap::Session<S>,
    inbox: String,
}

#[async_trait]
impl<S> MailSession for ImapSession<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + std::fmt::Debug,
{
    async fn open_inbox(&mut self) -> Result<u32> {
        // EXAMINE = read-only select; scans must never flip \Seen flags
        let mailbox = self
            .session
            .examine(&self.inbox)
            .await
            .map_err(|e| MailgateError::Mail(format!("Examine {}: {e}", self.inbox)))?;
        Ok(mailbox.exists)
    }

    async fn fetch_summaries(&mut self, start: u32, end: u32) -> Result<Vec<MessageSummary>> {
        if start > end {
            return Ok(Vec::new());
        }
        let range = format!("{start}:{end}");
        let mut fetches = self
            .session
            .fetch(&range, "(RFC822.HEADER)")
            .await
            .map_err(|e| MailgateError::Mail(format!("Fetch headers {range}: {e}")))?;

        let mut summaries = Vec::new();
        while let Some(item) = fetches.next().await {
            let msg = item.map_err(|e| MailgateError::Mail(format!("Fetch msg: {e}")))?;
            let seq = msg.message;
            let summary = match msg.header() {
                Some(raw) => parse_summary(raw, seq),
                None => MessageSummary {
                    seq,
                    ..Default::default()
                },
            };
            summaries.push(summary);
        }
        // the fetch stream borrows the session; release before returning
        drop(fetches);

        summaries.sort_by_key(|s| s.seq);
        Ok(summaries)
    }

    async fn fetch_full(&mut self, seq: u32) -> Result<FullMessage> {
        let mut fetches = self
            .session
            .fetch(seq.to_string(), "(RFC822)")
            .await
            .map_err(|e| MailgateError::Mail(format!("Fetch {seq}: {e}")))?;

        let mut raw: Option<Vec<u8>> = None;
        while let Some(item) = fetches.next().await {
            let msg = item.map_err(|e| MailgateError::Mail(format!("Fetch msg {seq}: {e}")))?;
            if let Some(body) = msg.body() {
                raw = Some(body.to_vec());
            }
        }
        drop(fetches);

        let raw = raw.ok_or_else(|| MailgateError::Mail(format!("message {seq} has no body")))?;
        parse_full(&raw)
            .ok_or_else(|| MailgateError::Mail(format!("message {seq} could not be parsed")))
    }

    async fn search_sender_in_references(
        &mut self,
        sender: &str,
        references: &[String],
    ) -> Result<Vec<u32>> {
        if references.is_empty() {
            return Ok(Vec::new());
        }
        let query = reference_search_query(sender, references);
        let hits = self
            .session
            .search(&query)
            .await
            .map_err(|e| MailgateError::Mail(format!("Search: {e}")))?;
        let mut seqs: Vec<u32> = hits.into_iter().collect();
        seqs.sort_unstable();
        Ok(seqs)
    }

    async fn drafts_special_folder(&mut self) -> Result<Option<String>> {
        use async_imap::types::NameAttribute;

        let mut names = self
            .session
            .list(Some(""), Some("*"))
            .await
            .map_err(|e| MailgateError::Mail(format!("List folders: {e}")))?;

        let mut found = None;
        while let Some(item) = names.next().await {
            let name = item.map_err(|e| MailgateError::Mail(format!("List folders: {e}")))?;
            let is_drafts = name.attributes().iter().any(|attr| {
                matches!(attr, NameAttribute::Extension(ext) if ext.as_ref().eq_ignore_ascii_case("\\Drafts"))
            });
            if is_drafts {
                found = Some(name.name().to_string());
                break;
            }
        }
        drop(names);
        Ok(found)
    }

    async fn append_draft(&mut self, folder: &str, mime: &[u8]) -> Result<()> {
        self.session
            .append(folder, Some("(\\Draft)"), None, mime)
            .await
            .map_err(|e| MailgateError::Mail(format!("Append to {folder}: {e}")))
    }

    async fn logout(&mut self) -> Result<()> {
        self.session
            .logout()
            .await
            .map_err(|e| MailgateError::Mail(format!("Logout: {e}")))
    }
}

/// Parse a header-only fetch into a summary.
fn parse_summary(raw: &[u8], seq: u32) -> MessageSummary {
    let Some(parsed) = MessageParser::default().parse(raw) else {
        return MessageSummary {
            seq,
            ..Default::default()
        };
    };

    let from = parsed
        .from()
        .and_then(|a| a.first())
        .and_then(|a| a.address().map(|email| MailAddress::new(a.name(), email)));

    MessageSummary {
        seq,
        message_id: parsed.message_id().map(str::to_string),
        from,
        subject: parsed.subject().map(str::to_string),
        date: parsed
            .date()
            .and_then(|d| chrono::DateTime::from_timestamp(d.to_timestamp(), 0)),
    }
}

/// Parse a full RFC822 fetch.
fn parse_full(raw: &[u8]) -> Option<FullMessage> {
    let parsed = MessageParser::default().parse(raw)?;

    let references = match parsed.header("References") {
        Some(HeaderValue::Text(id)) => vec![id.to_string()],
        Some(HeaderValue::TextList(ids)) => ids.iter().map(|id| id.to_string()).collect(),
        _ => Vec::new(),
    };

    Some(FullMessage {
        message_id: parsed.message_id().map(str::to_string),
        subject: parsed.subject().map(str::to_string),
        body_text: parsed.body_text(0).map(|s| s.to_string()),
        references,
        from: address_list(parsed.from()),
        to: address_list(parsed.to()),
        cc: address_list(parsed.cc()),
    })
}

fn address_list(addresses: Option<&mail_parser::Address<'_>>) -> Vec<MailAddress> {
    addresses
        .map(|list| {
            list.iter()
                .filter_map(|a| a.address().map(|email| MailAddress::new(a.name(), email)))
                .collect()
        })
        .unwrap_or_default()
}

/// Build the IMAP SEARCH query for "sent by `sender`, Message-ID among
/// `references`". IMAP OR is a binary prefix operator, so the reference
/// terms fold right-to-left.
fn reference_search_query(sender: &str, references: &[String]) -> String {
    let mut terms: Vec<String> = references
        .iter()
        .map(|r| format!("HEADER Message-ID \"{}\"", sanitize_atom(r)))
        .collect();

    let mut ored = terms.pop().unwrap_or_default();
    while let Some(term) = terms.pop() {
        ored = format!("OR {term} {ored}");
    }
    format!("FROM \"{}\" {ored}", sanitize_atom(sender))
}

fn sanitize_atom(s: &str) -> String {
    s.chars().filter(|c| *c != '"' && *c != '\\').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_parses_headers() {
        let raw = b"From: John Doe <john@x.com>\r\n\
            Subject: Invoice #1\r\n\
            Message-ID: <abc@x.com>\r\n\
            Date: Mon, 6 Jul 2026 10:00:00 +0000\r\n\r\n";
        let summary = parse_summary(raw, 7);
        assert_eq!(summary.seq, 7);
        assert_eq!(summary.message_id.as_deref(), Some("abc@x.com"));
        assert_eq!(summary.subject.as_deref(), Some("Invoice #1"));
        let from = summary.from.unwrap();
        assert_eq!(from.email, "john@x.com");
        assert_eq!(from.name.as_deref(), Some("John Doe"));
        assert!(summary.date.is_some());
    }

    #[test]
    fn full_message_collects_references_and_recipients() {
        let raw = b"From: john@x.com\r\n\
            To: me@x.com, jane@x.com\r\n\
            Cc: mgr@x.com\r\n\
            Subject: Re: Project X\r\n\
            Message-ID: <m3@x.com>\r\n\
            References: <m1@x.com> <m2@x.com>\r\n\
            Content-Type: text/plain\r\n\r\n\
            Can you confirm?\r\n";
        let full = parse_full(raw).unwrap();
        assert_eq!(full.references, vec!["m1@x.com", "m2@x.com"]);
        assert_eq!(full.to.len(), 2);
        assert_eq!(full.cc.len(), 1);
        assert_eq!(full.body_text.as_deref().map(str::trim), Some("Can you confirm?"));
    }

    #[test]
    fn search_query_folds_or_terms() {
        let q = reference_search_query("me@x.com", &["a@x".into()]);
        assert_eq!(q, "FROM \"me@x.com\" HEADER Message-ID \"a@x\"");

        let q = reference_search_query("me@x.com", &["a@x".into(), "b@x".into(), "c@x".into()]);
        assert_eq!(
            q,
            "FROM \"me@x.com\" OR HEADER Message-ID \"a@x\" \
             OR HEADER Message-ID \"b@x\" HEADER Message-ID \"c@x\""
        );
    }

    #[test]
    fn search_query_strips_quotes() {
        let q = reference_search_query("me@x.com", &["a\"b@x".into()]);
        assert!(!q.contains("a\"b"));
        assert!(q.contains("ab@x"));
    }
}
