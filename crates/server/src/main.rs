mod bootstrap;
mod health;
mod ingress;

use anyhow::Result;
use beacon_core::config::{AppConfig, LoadOptions};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use beacon_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let router = ingress::router(app.gateway.clone())
        .merge(health::router(app.publisher(), app.config.queue.name.as_str()));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        queue = %app.config.queue.name,
        "beacon-server listening for slack requests"
    );

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "beacon-server draining queue"
    );

    // The worker stops once the last publisher handle is gone.
    drop(app.gateway);
    let stats = app.worker.await?;
    tracing::info!(
        event_name = "system.server.stopped",
        correlation_id = "shutdown",
        handled = stats.handled,
        skipped = stats.skipped,
        dead_lettered = stats.dead_lettered,
        "beacon-server stopped"
    );

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            error = %error,
            "could not listen for shutdown signal"
        );
    }
}
