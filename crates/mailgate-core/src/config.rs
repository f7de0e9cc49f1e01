//! Mailgate configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MailgateError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailgateConfig {
    #[serde(default)]
    pub imap: ImapConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

impl MailgateConfig {
    /// Load config from the default path (~/.mailgate/mailgate.toml),
    /// falling back to defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MailgateError::Config(format!("Failed to read config: {e}")))?;
        let mut config: Self = toml::from_str(&content)
            .map_err(|e| MailgateError::Config(format!("Failed to parse config: {e}")))?;
        config.rules.normalize();
        Ok(config)
    }

    /// Get the default config path, honoring the MAILGATE_CONFIG env var.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("MAILGATE_CONFIG") {
            return PathBuf::from(path);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mailgate")
            .join("mailgate.toml")
    }

    /// Reject configurations the service cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.imap.username.is_empty() {
            return Err(MailgateError::Config("imap.username is required".into()));
        }
        if self.imap.password.is_empty() {
            return Err(MailgateError::Config("imap.password is required".into()));
        }
        Ok(())
    }
}

/// Mailbox connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImapConfig {
    #[serde(default = "default_imap_host")]
    pub host: String,
    #[serde(default = "default_imap_port")]
    pub port: u16,
    #[serde(default = "bool_true")]
    pub use_tls: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_inbox")]
    pub inbox: String,
    #[serde(default = "default_drafts_folder")]
    pub drafts_folder: String,
}

fn default_imap_host() -> String {
    "imap.gmail.com".into()
}
fn default_imap_port() -> u16 {
    993
}
fn default_inbox() -> String {
    "INBOX".into()
}
fn default_drafts_folder() -> String {
    "[Gmail]/Drafts".into()
}
fn bool_true() -> bool {
    true
}

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            host: default_imap_host(),
            port: default_imap_port(),
            use_tls: true,
            username: String::new(),
            password: String::new(),
            inbox: default_inbox(),
            drafts_folder: default_drafts_folder(),
        }
    }
}

/// HTTP API settings. An empty token makes every protected route fail
/// closed with a server error — the API never silently opens up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default)]
    pub token: String,
}

fn default_api_host() -> String {
    "0.0.0.0".into()
}
fn default_api_port() -> u16 {
    8087
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            token: String::new(),
        }
    }
}

/// Scan cycle behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// 5-field cron expression (UTC) driving the recurring scan.
    #[serde(default = "default_cron")]
    pub cron: String,
    #[serde(default = "bool_true")]
    pub scan_on_start: bool,
    /// How many of the most recent inbox messages one cycle inspects.
    #[serde(default = "default_scan_limit")]
    pub scan_limit: u32,
    #[serde(default = "bool_true")]
    pub fetch_body: bool,
    /// Full trimmed body instead of the 280-char snippet.
    #[serde(default)]
    pub fetch_full_body: bool,
    #[serde(default = "bool_true")]
    pub dedup_threads: bool,
    #[serde(default = "default_thread_item_limit")]
    pub thread_item_limit: usize,
    #[serde(default = "bool_true")]
    pub include_replied_threads: bool,
}

fn default_cron() -> String {
    "0 * * * *".into()
}
fn default_scan_limit() -> u32 {
    50
}
fn default_thread_item_limit() -> usize {
    6
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            cron: default_cron(),
            scan_on_start: true,
            scan_limit: default_scan_limit(),
            fetch_body: true,
            fetch_full_body: false,
            dedup_threads: true,
            thread_item_limit: default_thread_item_limit(),
            include_replied_threads: true,
        }
    }
}

/// Classification pattern lists. Ordered, lowercase, substring-matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default = "default_ignore_senders")]
    pub ignore_senders: Vec<String>,
    #[serde(default = "default_ignore_subjects")]
    pub ignore_subjects: Vec<String>,
    #[serde(default = "default_action_keywords")]
    pub action_keywords: Vec<String>,
}

fn default_ignore_senders() -> Vec<String> {
    vec!["no-reply".into(), "noreply".into(), "donotreply".into()]
}

fn default_ignore_subjects() -> Vec<String> {
    vec![
        "newsletter".into(),
        "unsubscribe".into(),
        "no-reply".into(),
        "noreply".into(),
        "do not reply".into(),
    ]
}

fn default_action_keywords() -> Vec<String> {
    vec![
        "action required".into(),
        "urgent".into(),
        "invoice".into(),
        "payment".into(),
        "overdue".into(),
        "confirm".into(),
        "verification".into(),
        "reset password".into(),
        "password reset".into(),
        "meeting".into(),
        "reschedule".into(),
        "sign".into(),
        "approve".into(),
    ]
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            ignore_senders: default_ignore_senders(),
            ignore_subjects: default_ignore_subjects(),
            action_keywords: default_action_keywords(),
        }
    }
}

impl RulesConfig {
    /// Lower-case and drop empty patterns. Matching is case-insensitive
    /// by contract, so the lists are normalized once at load time.
    pub fn normalize(&mut self) {
        for list in [
            &mut self.ignore_senders,
            &mut self.ignore_subjects,
            &mut self.action_keywords,
        ] {
            list.retain(|p| !p.trim().is_empty());
            for p in list.iter_mut() {
                *p = p.trim().to_lowercase();
            }
        }
    }
}

/// Outbound webhook settings. An empty URL disables notifications.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
}
