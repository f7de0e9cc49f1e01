//! The recurring scan loop.
//!
//! A single long-lived task: compute the next scheduled instant, sleep
//! until then (or until shutdown), run one scan cycle, forward new
//! alerts to the webhook. Scan and dispatch failures are logged and
//! never break the loop — transient mailbox or network trouble heals on
//! a later tick.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Notify;

use mailgate_core::Result;
use mailgate_core::types::ScanResult;
use mailgate_notify::WebhookNotifier;

use crate::cron::next_occurrence;

/// Retry interval when the cron expression yields no next occurrence.
const FALLBACK_DELAY: std::time::Duration = std::time::Duration::from_secs(3600);

/// Run the scan loop until `shutdown` fires. The scan callback keeps
/// this crate decoupled from the coordinator; the loop only cares that
/// a cycle yields a [`ScanResult`].
pub async fn run_scan_loop<F, Fut>(
    cron_expr: String,
    scan_on_start: bool,
    scan: F,
    notifier: Arc<WebhookNotifier>,
    shutdown: Arc<Notify>,
) where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<ScanResult>>,
{
    tracing::info!("⏰ Scan loop started (schedule: {cron_expr})");

    if scan_on_start {
        run_cycle(&scan, &notifier).await;
    }

    loop {
        let now = Utc::now();
        let delay = match next_occurrence(&cron_expr, now) {
            Some(next) => {
                let wait = (next - now).to_std().unwrap_or_default();
                tracing::debug!("Next scan at {next} (in {wait:?})");
                wait
            }
            None => {
                tracing::warn!(
                    "⚠️ Cron '{cron_expr}' yields no next occurrence; retrying in 1h"
                );
                FALLBACK_DELAY
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.notified() => {
                tracing::info!("Scan loop stopped");
                return;
            }
        }

        run_cycle(&scan, &notifier).await;
    }
}

async fn run_cycle<F, Fut>(scan: &F, notifier: &WebhookNotifier)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<ScanResult>>,
{
    match scan().await {
        Ok(result) => {
            tracing::info!(
                "Scan cycle completed: {} scanned, {} new alert(s)",
                result.scanned_count,
                result.new_alert_count
            );
            if !result.new_alerts.is_empty() {
                notifier.notify(&result.new_alerts).await;
            }
        }
        Err(e) => tracing::error!("❌ Scan cycle failed: {e}"),
    }
}
