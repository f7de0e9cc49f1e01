//! The alert data model shared across the workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a scanned message was judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Needs a human response.
    ActionRequired,
    /// Informational, no response expected.
    InfoOnly,
    /// Suppressed by the rules but part of a thread the mailbox owner
    /// already replied in.
    RepliedThread,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::ActionRequired => "action_required",
            Category::InfoOnly => "info_only",
            Category::RepliedThread => "replied_thread",
        };
        f.write_str(s)
    }
}

/// Rule engine verdict for one message. Ephemeral — never stored on its
/// own, only folded into the [`Alert`] it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub reason: String,
}

impl Classification {
    pub fn new(category: Category, reason: impl Into<String>) -> Self {
        Self {
            category,
            reason: reason.into(),
        }
    }
}

/// One mailbox message judged worth surfacing.
///
/// `id` is the protocol Message-ID when the message carries one, else the
/// stringified mailbox sequence id. Alerts are immutable; a re-scan of the
/// same message replaces the whole record (last write wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub from: String,
    pub subject: String,
    pub received_at: DateTime<Utc>,
    pub category: Category,
    pub reason: String,
    pub snippet: String,
    /// Session-scoped mailbox id needed to refetch the original message
    /// for reply construction.
    pub mailbox_sequence_id: u32,
}

/// Outcome of one scan cycle. `new_alerts` is exactly the subset of this
/// cycle's alerts whose id was not previously in the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub scanned_count: usize,
    pub new_alert_count: usize,
    pub new_alerts: Vec<Alert>,
}
