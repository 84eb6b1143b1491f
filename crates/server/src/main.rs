mod bootstrap;

use anyhow::Result;
use huddle_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use huddle_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;

    tracing::info!(
        event_name = "system.server.started",
        flow_ttl_secs = app.config.socket.flow_ttl_secs,
        reconnect_max_retries = app.config.socket.reconnect_max_retries,
        "huddle-server started"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let dispatch_loop = app.dispatch_loop;
    let worker = tokio::spawn(async move { dispatch_loop.run(shutdown_rx).await });

    wait_for_shutdown().await?;
    tracing::info!(event_name = "system.server.stopping", "huddle-server stopping");

    // The loop observes the signal between events; no in-flight handler is
    // interrupted.
    let _ = shutdown_tx.send(true);
    worker.await??;

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
