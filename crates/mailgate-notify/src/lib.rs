//! # Mailgate Notify
//!
//! Pushes a short digest of newly discovered alerts to a configured
//! webhook. Strictly best-effort: failures are logged and swallowed,
//! nothing is queued or retried — the next scan cycle produces the next
//! chance to notify.

use mailgate_core::config::WebhookConfig;
use mailgate_core::types::Alert;

/// How many alerts the digest spells out before collapsing the rest
/// into an "and N more" suffix.
const DIGEST_LIMIT: usize = 5;

/// Webhook notification dispatcher.
pub struct WebhookNotifier {
    url: String,
    token: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> Self {
        Self {
            url: config.url.clone(),
            token: config.token.clone(),
            client: reqwest::Client::new(),
        }
    }

    /// Whether a destination URL is configured at all.
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }

    /// POST a digest of `alerts` to the webhook. No-op when the URL is
    /// unconfigured or the batch is empty. Never returns an error;
    /// delivery failures end here, logged.
    pub async fn notify(&self, alerts: &[Alert]) {
        if !self.is_configured() {
            tracing::debug!("Webhook URL not configured, skipping notification");
            return;
        }
        if alerts.is_empty() {
            tracing::debug!("No alerts to notify");
            return;
        }

        let payload = serde_json::json!({
            "text": digest(alerts),
            "mode": "now",
        });

        let mut req = self
            .client
            .post(&self.url)
            .json(&payload)
            .timeout(std::time::Duration::from_secs(10));
        if !self.token.trim().is_empty() {
            req = req.bearer_auth(self.token.trim());
        }

        match req.send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(
                    "📣 Webhook notification sent: {} alert(s) to {}",
                    alerts.len(),
                    self.url
                );
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                tracing::warn!("⚠️ Webhook notification failed: {status} {body}");
            }
            Err(e) => {
                tracing::warn!("⚠️ Webhook send failed: {e}");
            }
        }
    }
}

/// Human-readable digest of a batch of alerts.
fn digest(alerts: &[Alert]) -> String {
    let mut text = format!("📬 Mailgate: {} new alert(s)", alerts.len());
    for alert in alerts.iter().take(DIGEST_LIMIT) {
        text.push_str(&format!(
            "\n• [{}] {}: {}",
            alert.category,
            display_name(&alert.from),
            alert.subject
        ));
    }
    if alerts.len() > DIGEST_LIMIT {
        text.push_str(&format!("\n  ...and {} more", alerts.len() - DIGEST_LIMIT));
    }
    text
}

/// Extract the display name from a `Name <email>` sender, else the
/// address itself.
fn display_name(from: &str) -> &str {
    let from = from.trim();
    if from.is_empty() {
        return "(unknown)";
    }
    match from.find('<') {
        Some(idx) if idx > 0 => from[..idx].trim().trim_matches('"').trim(),
        _ => from,
    }
}
