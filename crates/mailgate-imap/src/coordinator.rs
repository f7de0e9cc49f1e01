//! The scan coordinator — one scan cycle, and on-demand draft replies.
//!
//! A cycle pulls the last `scan_limit` message summaries from the inbox,
//! classifies each, optionally checks whether the mailbox owner already
//! replied in the thread, and upserts the survivors into the alert store.
//! Partial progress stays committed when a cycle fails mid-way; there is
//! no rollback and no retry — the next tick scans again.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use mailgate_core::config::{ImapConfig, ScanConfig};
use mailgate_core::error::{MailgateError, Result};
use mailgate_core::types::{Alert, Category, Classification, ScanResult};
use mailgate_rules::RuleEngine;
use mailgate_store::AlertStore;

use crate::reply::build_reply;
use crate::session::{FullMessage, MailConnector, MailSession, MessageSummary};

/// Snippet length cap when full-body extraction is off.
const SNIPPET_MAX_CHARS: usize = 280;

/// Fallback drafts path for servers that advertise no `\Drafts`
/// special-use folder but follow the Gmail naming scheme.
const WELL_KNOWN_DRAFTS: &str = "[Gmail]/Drafts";

/// Identifiers of a stored draft reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftReceipt {
    pub draft_message_id: String,
    /// The folder the draft actually landed in.
    pub drafts_folder: String,
    pub in_reply_to: String,
}

/// Drives scan cycles and draft construction against a mailbox.
pub struct ScanCoordinator {
    connector: Arc<dyn MailConnector>,
    rules: RuleEngine,
    store: Arc<AlertStore>,
    scan: ScanConfig,
    owner: String,
    drafts_folder: String,
}

impl ScanCoordinator {
    pub fn new(
        connector: Arc<dyn MailConnector>,
        rules: RuleEngine,
        store: Arc<AlertStore>,
        scan: ScanConfig,
        imap: &ImapConfig,
    ) -> Self {
        Self {
            connector,
            rules,
            store,
            scan,
            owner: imap.username.clone(),
            drafts_folder: imap.drafts_folder.clone(),
        }
    }

    pub fn store(&self) -> &Arc<AlertStore> {
        &self.store
    }

    /// Run one scan cycle. The mailbox session lives exactly as long as
    /// this call.
    pub async fn scan(&self) -> Result<ScanResult> {
        let mut session = self.connector.connect().await?;
        let result = self.scan_session(session.as_mut()).await;
        session.logout().await.ok();
        result
    }

    async fn scan_session(&self, session: &mut dyn MailSession) -> Result<ScanResult> {
        let total = session.open_inbox().await?;
        if total == 0 {
            return Ok(ScanResult::default());
        }

        let limit = self.scan.scan_limit.max(1);
        let start = total.saturating_sub(limit) + 1;
        let summaries = session.fetch_summaries(start, total).await?;
        let scanned = summaries.len();

        let mut new_alerts = Vec::new();
        for summary in &summaries {
            if let Some(alert) = self.evaluate(session, summary).await {
                let is_new = self.store.upsert(alert.clone());
                if is_new {
                    new_alerts.push(alert);
                }
            }
        }

        tracing::info!(
            "📧 Scan completed: {scanned} scanned, {} new alert(s)",
            new_alerts.len()
        );
        Ok(ScanResult {
            scanned_count: scanned,
            new_alert_count: new_alerts.len(),
            new_alerts,
        })
    }

    /// Classify one message; `Some` iff it should be surfaced.
    async fn evaluate(
        &self,
        session: &mut dyn MailSession,
        summary: &MessageSummary,
    ) -> Option<Alert> {
        let from = summary
            .from
            .as_ref()
            .map(|a| a.display())
            .unwrap_or_else(|| "(unknown)".to_string());
        let subject = summary.subject.clone().unwrap_or_default();

        let mut full: Option<FullMessage> = None;
        let mut snippet = String::new();
        if self.scan.fetch_body {
            match session.fetch_full(summary.seq).await {
                Ok(msg) => {
                    snippet = if self.scan.fetch_full_body {
                        extract_full_body(&msg)
                    } else {
                        extract_snippet(&msg)
                    };
                    full = Some(msg);
                }
                // non-fatal: classify on envelope data alone
                Err(e) => {
                    tracing::warn!("⚠️ Failed to fetch body for message {}: {e}", summary.seq)
                }
            }
        }

        let mut classification = self.rules.classify(&from, &subject, &snippet);
        if classification.category != Category::ActionRequired
            && self.scan.include_replied_threads
            && self.owner_replied(session, summary.seq, &mut full).await
        {
            classification = Classification::new(Category::RepliedThread, "thread with your reply");
        }

        if !matches!(
            classification.category,
            Category::ActionRequired | Category::RepliedThread
        ) {
            return None;
        }

        Some(Alert {
            id: summary
                .message_id
                .clone()
                .unwrap_or_else(|| summary.seq.to_string()),
            from,
            subject,
            received_at: summary.date.unwrap_or_else(Utc::now),
            category: classification.category,
            reason: classification.reason,
            snippet,
            mailbox_sequence_id: summary.seq,
        })
    }

    /// Whether the mailbox owner authored a message in this message's
    /// reference chain. Every failure degrades to "not replied".
    async fn owner_replied(
        &self,
        session: &mut dyn MailSession,
        seq: u32,
        full: &mut Option<FullMessage>,
    ) -> bool {
        if full.is_none() {
            match session.fetch_full(seq).await {
                Ok(msg) => *full = Some(msg),
                Err(e) => {
                    tracing::warn!("⚠️ Failed to check thread replies for message {seq}: {e}");
                    return false;
                }
            }
        }
        let references = match full.as_ref() {
            Some(msg) if !msg.references.is_empty() => &msg.references,
            _ => return false,
        };

        match session
            .search_sender_in_references(&self.owner, references)
            .await
        {
            Ok(hits) => !hits.is_empty(),
            Err(e) => {
                tracing::warn!("⚠️ Thread reply search failed for message {seq}: {e}");
                false
            }
        }
    }

    /// Build a reply draft for a stored alert and append it to the first
    /// drafts folder that accepts it.
    pub async fn create_draft_reply(
        &self,
        alert_id: &str,
        body: &str,
        subject_prefix: Option<&str>,
    ) -> Result<DraftReceipt> {
        let alert = self
            .store
            .get(alert_id)
            .ok_or_else(|| MailgateError::NotFound(format!("unknown alertId: {alert_id}")))?;

        let mut session = self.connector.connect().await?;
        let result = self
            .draft_session(session.as_mut(), &alert, body, subject_prefix)
            .await;
        session.logout().await.ok();
        result
    }

    async fn draft_session(
        &self,
        session: &mut dyn MailSession,
        alert: &Alert,
        body: &str,
        subject_prefix: Option<&str>,
    ) -> Result<DraftReceipt> {
        session.open_inbox().await?;
        let original = session.fetch_full(alert.mailbox_sequence_id).await?;
        let draft = build_reply(&original, &self.owner, body, subject_prefix)?;

        // Candidate folders in preference order: the server-advertised
        // special folder, the well-known Gmail path, the configured
        // default. First successful append wins.
        let mut candidates: Vec<String> = Vec::new();
        match session.drafts_special_folder().await {
            Ok(Some(special)) => candidates.push(special),
            Ok(None) => {}
            Err(e) => tracing::warn!("⚠️ Drafts folder discovery failed: {e}"),
        }
        candidates.push(WELL_KNOWN_DRAFTS.to_string());
        candidates.push(self.drafts_folder.clone());
        let mut seen = HashSet::new();
        candidates.retain(|c| seen.insert(c.clone()));

        let mut used = None;
        for folder in &candidates {
            match session.append_draft(folder, &draft.mime).await {
                Ok(()) => {
                    tracing::info!("📝 Draft reply to {} stored in {folder}", alert.id);
                    used = Some(folder.clone());
                    break;
                }
                Err(e) => tracing::warn!("⚠️ Draft append to {folder} failed: {e}"),
            }
        }
        let drafts_folder = used.ok_or_else(|| {
            MailgateError::Mail(format!(
                "no drafts folder accepted the append (tried: {})",
                candidates.join(", ")
            ))
        })?;

        Ok(DraftReceipt {
            draft_message_id: draft.message_id,
            drafts_folder,
            in_reply_to: draft.in_reply_to,
        })
    }
}

/// Trimmed full text body.
fn extract_full_body(msg: &FullMessage) -> String {
    msg.body_text.as_deref().unwrap_or("").trim().to_string()
}

/// Whitespace-collapsed prefix of the text body, capped at
/// [`SNIPPET_MAX_CHARS`].
fn extract_snippet(msg: &FullMessage) -> String {
    let collapsed = msg
        .body_text
        .as_deref()
        .unwrap_or("")
        .replace(['\r', '\n'], " ");
    collapsed.trim().chars().take(SNIPPET_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mailgate_core::config::RulesConfig;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::session::MailAddress;

    /// Scripted in-memory mailbox. Cloned per `connect`, with appends
    /// shared so the test can observe them.
    #[derive(Clone, Default)]
    struct MockMailbox {
        summaries: Vec<MessageSummary>,
        full: HashMap<u32, FullMessage>,
        failing_bodies: HashSet<u32>,
        /// Reference ids that count as "owner replied here".
        owner_reply_refs: HashSet<String>,
        special_folder: Option<String>,
        rejected_folders: HashSet<String>,
        appends: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    }

    #[async_trait]
    impl MailSession for MockMailbox {
        async fn open_inbox(&mut self) -> Result<u32> {
            Ok(self.summaries.iter().map(|s| s.seq).max().unwrap_or(0))
        }

        async fn fetch_summaries(&mut self, start: u32, end: u32) -> Result<Vec<MessageSummary>> {
            Ok(self
                .summaries
                .iter()
                .filter(|s| s.seq >= start && s.seq <= end)
                .cloned()
                .collect())
        }

        async fn fetch_full(&mut self, seq: u32) -> Result<FullMessage> {
            if self.failing_bodies.contains(&seq) {
                return Err(MailgateError::Mail(format!("fetch {seq} failed")));
            }
            self.full
                .get(&seq)
                .cloned()
                .ok_or_else(|| MailgateError::Mail(format!("no message {seq}")))
        }

        async fn search_sender_in_references(
            &mut self,
            _sender: &str,
            references: &[String],
        ) -> Result<Vec<u32>> {
            if references.iter().any(|r| self.owner_reply_refs.contains(r)) {
                Ok(vec![42])
            } else {
                Ok(Vec::new())
            }
        }

        async fn drafts_special_folder(&mut self) -> Result<Option<String>> {
            Ok(self.special_folder.clone())
        }

        async fn append_draft(&mut self, folder: &str, mime: &[u8]) -> Result<()> {
            if self.rejected_folders.contains(folder) {
                return Err(MailgateError::Mail(format!("append to {folder} rejected")));
            }
            self.appends
                .lock()
                .unwrap()
                .push((folder.to_string(), mime.to_vec()));
            Ok(())
        }

        async fn logout(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct MockConnector(MockMailbox);

    #[async_trait]
    impl MailConnector for MockConnector {
        async fn connect(&self) -> Result<Box<dyn MailSession>> {
            Ok(Box::new(self.0.clone()))
        }
    }

    fn summary(seq: u32, from: &str, subject: &str) -> MessageSummary {
        MessageSummary {
            seq,
            message_id: Some(format!("msg-{seq}@x.com")),
            from: Some(MailAddress::new(None, from)),
            subject: Some(subject.to_string()),
            date: Some(Utc::now()),
        }
    }

    fn full_with_body(body: &str) -> FullMessage {
        FullMessage {
            body_text: Some(body.to_string()),
            ..Default::default()
        }
    }

    fn coordinator(mailbox: MockMailbox, scan: ScanConfig) -> ScanCoordinator {
        let imap = ImapConfig {
            username: "me@x.com".into(),
            password: "secret".into(),
            drafts_folder: "Drafts".into(),
            ..Default::default()
        };
        ScanCoordinator::new(
            Arc::new(MockConnector(mailbox)),
            RuleEngine::new(&RulesConfig::default()),
            Arc::new(AlertStore::new()),
            scan,
            &imap,
        )
    }

    fn default_scan() -> ScanConfig {
        ScanConfig {
            include_replied_threads: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn scan_classifies_and_stores_action_alerts() {
        let mut mailbox = MockMailbox::default();
        mailbox.summaries = vec![
            summary(1, "no-reply@x.com", "ACTION REQUIRED"),
            summary(2, "u@x.com", "FYI"),
            summary(3, "u@x.com", "Invoice #1"),
        ];
        for seq in 1..=3 {
            mailbox.full.insert(seq, full_with_body("no questions"));
        }

        let coord = coordinator(mailbox, default_scan());
        let result = coord.scan().await.unwrap();

        assert_eq!(result.scanned_count, 3);
        assert_eq!(result.new_alert_count, 1);
        assert_eq!(result.new_alerts[0].subject, "Invoice #1");
        assert_eq!(result.new_alerts[0].reason, "keyword: invoice");
        assert_eq!(coord.store().len(), 1);
    }

    #[tokio::test]
    async fn body_fetch_failure_is_isolated() {
        let mut mailbox = MockMailbox::default();
        mailbox.summaries = vec![
            summary(1, "u@x.com", "hello"),
            summary(2, "u@x.com", "also hello"),
            summary(3, "u@x.com", "checking in"),
        ];
        mailbox.full.insert(1, full_with_body("Can you review?"));
        mailbox.failing_bodies.insert(2);
        mailbox.full.insert(3, full_with_body("Does this work?"));

        let coord = coordinator(mailbox, default_scan());
        let result = coord.scan().await.unwrap();

        // the failed message is still counted, classified on envelope
        // data only (empty snippet → no question heuristic)
        assert_eq!(result.scanned_count, 3);
        assert_eq!(result.new_alert_count, 2);
        let subjects: Vec<_> = result.new_alerts.iter().map(|a| a.subject.as_str()).collect();
        assert_eq!(subjects, vec!["hello", "checking in"]);
    }

    #[tokio::test]
    async fn rescan_reports_no_new_alerts() {
        let mut mailbox = MockMailbox::default();
        mailbox.summaries = vec![summary(1, "u@x.com", "Invoice #9")];
        mailbox.full.insert(1, full_with_body(""));

        let coord = coordinator(mailbox, default_scan());
        let first = coord.scan().await.unwrap();
        assert_eq!(first.new_alert_count, 1);

        let second = coord.scan().await.unwrap();
        assert_eq!(second.scanned_count, 1);
        assert_eq!(second.new_alert_count, 0);
        assert!(second.new_alerts.is_empty());
    }

    #[tokio::test]
    async fn scan_window_is_bounded_by_limit() {
        let mut mailbox = MockMailbox::default();
        for seq in 1..=100 {
            mailbox.summaries.push(summary(seq, "u@x.com", "FYI"));
            mailbox.full.insert(seq, full_with_body(""));
        }
        let coord = coordinator(mailbox, default_scan());
        let result = coord.scan().await.unwrap();
        // scan_limit defaults to 50: only the newest 50 are inspected
        assert_eq!(result.scanned_count, 50);
    }

    #[tokio::test]
    async fn replied_thread_overrides_suppression() {
        let mut mailbox = MockMailbox::default();
        mailbox.summaries = vec![summary(1, "u@x.com", "status update")];
        let mut msg = full_with_body("nothing actionable");
        msg.references = vec!["thread-root@x.com".into()];
        mailbox.full.insert(1, msg);
        mailbox.owner_reply_refs.insert("thread-root@x.com".into());

        let scan = ScanConfig {
            include_replied_threads: true,
            ..Default::default()
        };
        let coord = coordinator(mailbox, scan);
        let result = coord.scan().await.unwrap();

        assert_eq!(result.new_alert_count, 1);
        assert_eq!(result.new_alerts[0].category, Category::RepliedThread);
        assert_eq!(result.new_alerts[0].reason, "thread with your reply");
    }

    #[tokio::test]
    async fn action_required_skips_thread_check() {
        // a message that is already action_required keeps its keyword
        // reason even when the owner replied in the thread
        let mut mailbox = MockMailbox::default();
        mailbox.summaries = vec![summary(1, "u@x.com", "Invoice #3")];
        let mut msg = full_with_body("");
        msg.references = vec!["thread-root@x.com".into()];
        mailbox.full.insert(1, msg);
        mailbox.owner_reply_refs.insert("thread-root@x.com".into());

        let scan = ScanConfig {
            include_replied_threads: true,
            ..Default::default()
        };
        let coord = coordinator(mailbox, scan);
        let result = coord.scan().await.unwrap();
        assert_eq!(result.new_alerts[0].category, Category::ActionRequired);
        assert_eq!(result.new_alerts[0].reason, "keyword: invoice");
    }

    #[tokio::test]
    async fn draft_reply_unknown_alert_is_client_error() {
        let coord = coordinator(MockMailbox::default(), default_scan());
        let err = coord
            .create_draft_reply("nope", "hello", None)
            .await
            .unwrap_err();
        assert!(matches!(err, MailgateError::NotFound(_)));
    }

    #[tokio::test]
    async fn draft_reply_falls_back_through_folders() {
        let mut mailbox = MockMailbox::default();
        mailbox.summaries = vec![summary(5, "john@x.com", "Invoice #5")];
        let mut msg = full_with_body("please pay");
        msg.message_id = Some("orig@x.com".into());
        msg.subject = Some("Invoice #5".into());
        msg.from = vec![MailAddress::new(Some("John"), "john@x.com")];
        msg.to = vec![MailAddress::new(None, "me@x.com")];
        mailbox.full.insert(5, msg);
        mailbox.special_folder = Some("Server/Drafts".into());
        mailbox.rejected_folders.insert("Server/Drafts".into());
        mailbox.rejected_folders.insert(WELL_KNOWN_DRAFTS.into());
        let appends = mailbox.appends.clone();

        let coord = coordinator(mailbox, default_scan());
        coord.scan().await.unwrap();
        let receipt = coord
            .create_draft_reply("msg-5@x.com", "On it.", None)
            .await
            .unwrap();

        // both preferred folders rejected the append — the configured
        // default took it
        assert_eq!(receipt.drafts_folder, "Drafts");
        assert_eq!(receipt.in_reply_to, "orig@x.com");
        let stored = appends.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].0, "Drafts");
        let mime = String::from_utf8_lossy(&stored[0].1).to_string();
        assert!(mime.contains("On it."));
        assert!(mime.contains("Subject: Re: Invoice #5"));
    }

    #[tokio::test]
    async fn draft_reply_prefers_special_folder() {
        let mut mailbox = MockMailbox::default();
        mailbox.summaries = vec![summary(5, "john@x.com", "Invoice #5")];
        let mut msg = full_with_body("");
        msg.from = vec![MailAddress::new(None, "john@x.com")];
        mailbox.full.insert(5, msg);
        mailbox.special_folder = Some("Server/Drafts".into());

        let coord = coordinator(mailbox, default_scan());
        coord.scan().await.unwrap();
        let receipt = coord
            .create_draft_reply("msg-5@x.com", "ok", None)
            .await
            .unwrap();
        assert_eq!(receipt.drafts_folder, "Server/Drafts");
    }

    #[test]
    fn snippet_collapses_whitespace_and_caps_length() {
        let msg = full_with_body("  line one\r\nline two\r\n");
        assert_eq!(extract_snippet(&msg), "line one  line two");

        let long = full_with_body(&"x".repeat(500));
        assert_eq!(extract_snippet(&long).chars().count(), SNIPPET_MAX_CHARS);
    }

    #[test]
    fn full_body_is_only_trimmed() {
        let msg = full_with_body("  keep\nthe\nlines  ");
        assert_eq!(extract_full_body(&msg), "keep\nthe\nlines");
    }
}
