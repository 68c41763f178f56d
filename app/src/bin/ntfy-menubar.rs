//! Menu-bar daemon binary.
//!
//! Opens the store, subscribes to every topic, starts the control API and
//! background tasks, and shuts down cleanly on Ctrl+C.

use tracing_subscriber::EnvFilter;

use ntfy_menubar_lib::app::SharedState;
use ntfy_menubar_lib::shutdown::graceful_shutdown;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting ntfy menu-bar daemon");

    let (db, config, dir) = ntfy_menubar_lib::init_foundation()?;
    let (state, channels) = SharedState::new(db, config, dir)?;

    ntfy_menubar_lib::spawn_background_tasks(state.clone(), channels);

    if let Err(e) = ntfy_menubar_lib::start_subscriptions(&state).await {
        tracing::error!("Failed to start subscriptions: {e}");
    }

    tracing::info!(
        port = state.server_port(),
        "Daemon running. Press Ctrl+C to stop."
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    graceful_shutdown(&state).await;
    Ok(())
}
