//! HTTP server implementation using Axum.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use mailgate_core::config::{ApiConfig, ScanConfig};
use mailgate_imap::ScanCoordinator;
use mailgate_notify::WebhookNotifier;
use mailgate_store::AlertStore;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub api: ApiConfig,
    pub scan: ScanConfig,
    pub store: Arc<AlertStore>,
    pub coordinator: Arc<ScanCoordinator>,
    pub notifier: Arc<WebhookNotifier>,
}

/// Bearer-token auth middleware. Fails closed: with no token configured
/// every protected route answers 500 rather than silently opening up.
async fn require_token(
    State(state): State<Arc<AppState>>,
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let expected = state.api.token.trim();
    if expected.is_empty() {
        return error_response(
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "api token is not configured",
        );
    }

    let auth = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let ok = auth
        .strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .is_some_and(|token| token == expected);

    if !ok {
        return error_response(axum::http::StatusCode::UNAUTHORIZED, "unauthorized");
    }

    next.run(req).await
}

fn error_response(status: axum::http::StatusCode, message: &str) -> axum::response::Response {
    axum::response::Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(axum::body::Body::from(
            serde_json::json!({"ok": false, "error": message}).to_string(),
        ))
        .unwrap()
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    // Protected routes — require the configured bearer token
    let protected = Router::new()
        .route("/v1/alerts", get(super::routes::list_alerts))
        .route("/v1/scan", post(super::routes::trigger_scan))
        .route("/v1/drafts", post(super::routes::create_draft))
        .route_layer(axum::middleware::from_fn_with_state(
            shared.clone(),
            require_token,
        ));

    // Public routes — health stays reachable for local probes
    let public = Router::new().route("/health", get(super::routes::health_check));

    protected
        .merge(public)
        .layer(
            CorsLayer::new()
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers(Any)
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Start the HTTP server; resolves when the listener shuts down.
pub async fn start(state: AppState, shutdown: Arc<tokio::sync::Notify>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.api.host, state.api.port);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Gateway listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.notified().await })
        .await?;
    Ok(())
}
