//! # Mailgate Store
//!
//! Concurrent in-memory alert ledger, keyed by alert id. The store only
//! ever grows for the lifetime of the process — alert history is not
//! persisted, and alerts are replaced wholesale, never partially updated.

use std::collections::HashMap;
use std::sync::Mutex;

use mailgate_core::types::Alert;

/// Thread-safe ledger of alerts keyed by id.
///
/// A scheduled scan and an on-demand manual scan may upsert concurrently;
/// each observes its own "was this new" result. Two racing cycles can
/// therefore both report the same id as new. That race is tolerated:
/// notification delivery is best-effort anyway.
#[derive(Debug, Default)]
pub struct AlertStore {
    alerts: Mutex<HashMap<String, Alert>>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by id. Returns true iff the id was not present
    /// before; the caller uses this to decide webhook eligibility.
    /// Last write wins, no merging.
    pub fn upsert(&self, alert: Alert) -> bool {
        let mut alerts = self.alerts.lock().unwrap();
        alerts.insert(alert.id.clone(), alert).is_none()
    }

    pub fn get(&self, id: &str) -> Option<Alert> {
        self.alerts.lock().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All alerts, newest first. With `dedup_threads` set, alerts sharing
    /// a normalized subject count as one thread and only the newest
    /// `thread_item_limit` of each thread survive, in their original
    /// positions. This bounds how much of one long email thread reaches
    /// an API consumer.
    pub fn list(&self, dedup_threads: bool, thread_item_limit: usize) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self.alerts.lock().unwrap().values().cloned().collect();
        alerts.sort_by(|a, b| b.received_at.cmp(&a.received_at).then(a.id.cmp(&b.id)));

        if !dedup_threads {
            return alerts;
        }

        let mut seen_per_thread: HashMap<String, usize> = HashMap::new();
        alerts
            .into_iter()
            .filter(|alert| {
                let count = seen_per_thread.entry(thread_key(&alert.subject)).or_insert(0);
                *count += 1;
                *count <= thread_item_limit
            })
            .collect()
    }
}

/// Normalize a subject into its thread key: trim, iteratively strip
/// leading reply/forward markers, lower-case.
///
/// "Project X", "Re: Project X", and "RE: Fwd: Project X" all map to
/// "project x".
pub fn thread_key(subject: &str) -> String {
    const MARKERS: [&str; 3] = ["re:", "fwd:", "fw:"];

    let mut rest = subject.trim();
    loop {
        let lower = rest.to_ascii_lowercase();
        match MARKERS.iter().find(|m| lower.starts_with(*m)) {
            // markers are pure ASCII, so the byte offset is valid in `rest`
            Some(marker) => rest = rest[marker.len()..].trim_start(),
            None => break,
        }
    }
    rest.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use mailgate_core::types::{Alert, Category};

    fn alert(id: &str, subject: &str, age_mins: i64) -> Alert {
        Alert {
            id: id.into(),
            from: "u@x.com".into(),
            subject: subject.into(),
            received_at: Utc::now() - Duration::minutes(age_mins),
            category: Category::ActionRequired,
            reason: "keyword: invoice".into(),
            snippet: String::new(),
            mailbox_sequence_id: 1,
        }
    }

    #[test]
    fn upsert_reports_new_only_once() {
        let store = AlertStore::new();
        assert!(store.upsert(alert("a", "one", 0)));
        assert!(!store.upsert(alert("a", "one again", 0)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn upsert_is_last_write_wins() {
        let store = AlertStore::new();
        store.upsert(alert("a", "first subject", 10));
        store.upsert(alert("a", "second subject", 0));
        let stored = store.get("a").unwrap();
        assert_eq!(stored.subject, "second subject");
    }

    #[test]
    fn list_is_descending_by_received_at() {
        let store = AlertStore::new();
        store.upsert(alert("old", "a", 30));
        store.upsert(alert("new", "b", 0));
        store.upsert(alert("mid", "c", 15));
        let ids: Vec<_> = store.list(false, 0).into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn thread_key_strips_reply_markers() {
        assert_eq!(thread_key("Project X"), "project x");
        assert_eq!(thread_key("Re: Project X"), "project x");
        assert_eq!(thread_key("RE: Project X"), "project x");
        assert_eq!(thread_key("  FW: Re: Fwd: Project X "), "project x");
    }

    #[test]
    fn dedup_keeps_newest_of_thread() {
        let store = AlertStore::new();
        store.upsert(alert("a", "Project X", 20));
        store.upsert(alert("b", "Re: Project X", 10));
        store.upsert(alert("c", "RE: Project X", 0));
        let listed = store.list(true, 1);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "c");
    }

    #[test]
    fn dedup_limit_bounds_each_thread_independently() {
        let store = AlertStore::new();
        store.upsert(alert("a1", "Thread A", 40));
        store.upsert(alert("a2", "Re: Thread A", 30));
        store.upsert(alert("a3", "Re: Thread A", 20));
        store.upsert(alert("b1", "Thread B", 10));
        let ids: Vec<_> = store.list(true, 2).into_iter().map(|a| a.id).collect();
        // two newest of thread A survive, thread B untouched, order preserved
        assert_eq!(ids, vec!["b1", "a3", "a2"]);
    }

    #[test]
    fn concurrent_upserts_report_new_exactly_once() {
        use std::sync::Arc;

        let store = Arc::new(AlertStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || store.upsert(alert("same-id", &format!("write {i}"), 0)))
            })
            .collect();
        let fresh = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|new| *new)
            .count();
        assert_eq!(fresh, 1);
        assert_eq!(store.len(), 1);
    }
}
