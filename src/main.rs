//! Blazium Bot - Discord chat bot using Twilight
//!
//! Runs two independent subsystems:
//! - an HTTP server for link previews, health/ready probes and metrics
//! - a Discord bot whose shard manager runs on a background task
//!
//! The HTTP server keeps serving if the bot fails to start.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{error, info, warn};
use twilight_http::Client;

mod config;
mod dispatch;
pub mod error;
mod events;
mod metrics;
mod shard;
mod web;

use config::BotConfig;
use dispatch::{run_outbox, Dispatcher, Outbox};
use error::BotError;
use metrics::BotMetrics;
use shard::{ManagerHandle, ManagerState, ManagerStatus, ShardManager, TwilightLauncher};
use web::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first to get log level; a missing token is fatal
    let bot_config = BotConfig::from_env()?;

    // Initialize tracing with configured log level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("blazium_bot={}", bot_config.log_level).parse()?)
                .add_directive("twilight_gateway=info".parse()?)
                .add_directive("twilight_http=warn".parse()?),
        )
        .json()
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        http_port = bot_config.http_port,
        "Starting Blazium bot"
    );

    let metrics = BotMetrics::install()?;
    info!("Prometheus metrics initialized");

    // A bind failure must exit before the bot task is spawned
    let listener = web::bind(bot_config.http_port).await?;

    // Bot subsystem runs concurrently with the HTTP server
    let (status_tx, status_rx) = watch::channel(ManagerStatus::default());
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let bot = tokio::spawn(run_bot(
        bot_config.clone(),
        status_tx,
        metrics.clone(),
        shutdown_rx,
    ));

    let app_state = AppState {
        manager_status: status_rx,
        metrics: metrics.clone(),
    };

    info!(port = bot_config.http_port, "Starting HTTP server");
    let http_server = axum::serve(listener, web::router(app_state));

    tokio::select! {
        result = http_server => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Shutting down...");

    // Err means the bot task already ended (it never started)
    let _ = shutdown_tx.send(());
    if let Err(e) = bot.await {
        error!(error = %e, "Bot task ended abnormally");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Bot subsystem: start, wait for shutdown, stop
async fn run_bot(
    config: BotConfig,
    status: watch::Sender<ManagerStatus>,
    metrics: BotMetrics,
    shutdown: oneshot::Receiver<()>,
) {
    let manager = match start_bot(&config, status, &metrics).await {
        Ok(manager) => manager,
        Err(e) => {
            metrics.record_error(e.error_type_label());
            error!(error = %e, "Failed to start bot, HTTP server keeps running");
            return;
        }
    };

    info!(shards = manager.status().shards, "Bot is now running");
    let _ = shutdown.await;

    info!("Stopping shard manager...");
    match manager.shutdown().await {
        Ok(()) => info!("Shard manager stopped, bot is shut down"),
        Err(e) => warn!(error = %e, "Shard manager was already stopped"),
    }
}

/// Resolve identity, launch shards, spawn the dispatch and outbox workers
async fn start_bot(
    config: &BotConfig,
    status: watch::Sender<ManagerStatus>,
    metrics: &BotMetrics,
) -> Result<ManagerHandle, BotError> {
    let http = Arc::new(Client::new(config.discord_token.clone()));

    let current_user = match fetch_identity(&http).await {
        Ok(user) => user,
        Err(e) => {
            status.send_replace(ManagerStatus {
                state: ManagerState::Degraded,
                shards: 0,
            });
            return Err(e);
        }
    };
    info!(user_id = %current_user.id, name = %current_user.name, "Resolved bot identity");

    let intents = BotConfig::intents();
    info!(?intents, "Using Discord intents");

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let launcher = TwilightLauncher::new(
        Arc::clone(&http),
        config.discord_token.clone(),
        intents,
        event_tx,
        metrics.clone(),
    );

    info!("Starting shard manager...");
    let manager = ShardManager::start(launcher, status, metrics.clone()).await?;

    let (outbox, replies) = Outbox::channel();
    tokio::spawn(run_outbox(http, replies, metrics.clone()));

    let dispatcher = Dispatcher::new(current_user.id, manager.clone(), outbox, metrics.clone());
    tokio::spawn(dispatcher.run(event_rx));

    Ok(manager)
}

async fn fetch_identity(
    http: &Client,
) -> Result<twilight_model::user::CurrentUser, BotError> {
    http.current_user()
        .await
        .map_err(|e| BotError::Identity(Box::new(e)))?
        .model()
        .await
        .map_err(|e| BotError::Identity(Box::new(e)))
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
