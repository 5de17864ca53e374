mod api;
mod auth;
mod bootstrap;
mod health;
pub mod portal;

use anyhow::Result;
use shopfloor_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use shopfloor_core::config::LogFormat::*;
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

    // Bootstrap using the same config we already loaded
    let app = bootstrap::bootstrap_with_config(config).await?;

    let state = api::ApiState::new(
        app.db_pool.clone(),
        app.config.approval.secret.clone(),
        app.config.server.public_base_url.clone(),
    );
    let router = api::router(state.clone())
        .merge(portal::router(state.approvals.clone()))
        .merge(health::router(app.db_pool.clone()));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        public_base_url = %app.config.server.public_base_url,
        "shopfloor-server listening"
    );

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(event_name = "system.server.stopping", "shopfloor-server stopping");
    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
