//! # Mailgate — mailbox gatekeeper service
//!
//! Scans a mailbox on a cron schedule, flags messages that need a human
//! response, serves the alert ledger over an authenticated HTTP API, and
//! pushes new-alert digests to a webhook.
//!
//! Usage:
//!   mailgate                            # Config from ~/.mailgate/mailgate.toml
//!   mailgate --config ./mailgate.toml   # Explicit config path
//!   mailgate --check-config             # Validate config and exit

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mailgate_core::MailgateConfig;
use mailgate_gateway::AppState;
use mailgate_imap::{ImapConnector, ScanCoordinator};
use mailgate_notify::WebhookNotifier;
use mailgate_rules::RuleEngine;
use mailgate_store::AlertStore;

#[derive(Parser)]
#[command(name = "mailgate", version, about = "📬 Mailgate — mailbox gatekeeper")]
struct Cli {
    /// Path to the config file (default: ~/.mailgate/mailgate.toml or
    /// $MAILGATE_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check_config: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "mailgate=debug,tower_http=debug"
    } else {
        "mailgate=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => MailgateConfig::load_from(path)?,
        None => MailgateConfig::load()?,
    };
    config.validate()?;

    if cli.check_config {
        println!("✅ Config OK ({})", config.imap.username);
        return Ok(());
    }

    let store = Arc::new(AlertStore::new());
    let rules = RuleEngine::new(&config.rules);
    let connector = Arc::new(ImapConnector::new(config.imap.clone()));
    let coordinator = Arc::new(ScanCoordinator::new(
        connector,
        rules,
        store.clone(),
        config.scan.clone(),
        &config.imap,
    ));
    let notifier = Arc::new(WebhookNotifier::new(&config.webhook));

    let shutdown = Arc::new(tokio::sync::Notify::new());

    // Background scan loop — the only writer path besides manual scans
    let loop_coordinator = coordinator.clone();
    let loop_notifier = notifier.clone();
    let loop_shutdown = shutdown.clone();
    let scan_config = config.scan.clone();
    tokio::spawn(async move {
        mailgate_scheduler::run_scan_loop(
            scan_config.cron.clone(),
            scan_config.scan_on_start,
            move || {
                let coordinator = loop_coordinator.clone();
                async move { coordinator.scan().await }
            },
            loop_notifier,
            loop_shutdown,
        )
        .await;
    });

    // Ctrl-C ends the scan loop and drains the HTTP server
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            signal_shutdown.notify_waiters();
            signal_shutdown.notify_one();
        }
    });

    let state = AppState {
        api: config.api.clone(),
        scan: config.scan.clone(),
        store,
        coordinator,
        notifier,
    };
    mailgate_gateway::start(state, shutdown).await
}
