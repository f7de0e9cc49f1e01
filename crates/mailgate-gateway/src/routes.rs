//! API route handlers for the gateway.

use std::sync::Arc;

use axum::{Json, extract::Query, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use mailgate_core::error::MailgateError;
use mailgate_core::types::Alert;

use super::server::AppState;

/// Health check endpoint (no auth).
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "service": "mailgate",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertsQuery {
    pub limit: Option<usize>,
    /// RFC3339 timestamp; only alerts received at or after this instant.
    pub since: Option<DateTime<Utc>>,
}

/// List alerts, newest first. Thread collapsing is a configuration
/// choice, not a per-request one.
pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertsQuery>,
) -> Json<Vec<Alert>> {
    let take = query.limit.unwrap_or(20).clamp(1, 200);
    let alerts = state
        .store
        .list(state.scan.dedup_threads, state.scan.thread_item_limit)
        .into_iter()
        .filter(|a| query.since.is_none_or(|since| a.received_at >= since))
        .take(take)
        .collect();
    Json(alerts)
}

/// Run one scan cycle right now. New alerts go to the webhook exactly as
/// they would from a scheduled cycle.
pub async fn trigger_scan(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let result = state.coordinator.scan().await?;
    if !result.new_alerts.is_empty() {
        state.notifier.notify(&result.new_alerts).await;
    }
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDraftRequest {
    #[serde(default)]
    pub alert_id: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub subject_prefix: Option<String>,
}

/// Create a draft reply for a stored alert.
pub async fn create_draft(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDraftRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.alert_id.trim().is_empty() {
        return Err(MailgateError::InvalidRequest("alertId is required".into()).into());
    }
    if req.body.trim().is_empty() {
        return Err(MailgateError::InvalidRequest("body is required".into()).into());
    }

    let receipt = state
        .coordinator
        .create_draft_reply(&req.alert_id, &req.body, req.subject_prefix.as_deref())
        .await?;
    Ok(Json(receipt))
}

/// Maps [`MailgateError`] onto HTTP responses.
#[derive(Debug)]
pub struct ApiError(MailgateError);

impl From<MailgateError> for ApiError {
    fn from(err: MailgateError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            MailgateError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            MailgateError::NotFound(_) => StatusCode::NOT_FOUND,
            MailgateError::Mail(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("❌ Request failed: {}", self.0);
        }
        (
            status,
            Json(serde_json::json!({"ok": false, "error": self.0.to_string()})),
        )
            .into_response()
    }
}
