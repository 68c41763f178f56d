use std::path::PathBuf;

use ntfy_db::Database;

use crate::app::{BackgroundChannels, SharedState};
use crate::background;
use crate::config::{AppConfig, SettingsManager};
use crate::managed::sync_managed_topics;
use crate::notification;
use crate::server;
use crate::services::{message_handler, topics};

/// Foundation init: data dir, database, settings, config (fatal on error).
pub fn init_foundation() -> Result<(Database, AppConfig, PathBuf), anyhow::Error> {
    load_dotenv();
    let dir = data_dir();
    std::fs::create_dir_all(&dir)?;

    let db_path = dir.join("ntfy.db");
    tracing::info!("Opening database at {}", db_path.display());
    let db = Database::open(&db_path)?;

    let sm = SettingsManager::new(db.clone());
    if let Err(e) = sm.migrate_from_env() {
        tracing::error!("Failed to migrate from env: {e}");
    }
    sm.initialize_defaults()?;

    let config = AppConfig::load(&sm)?;

    if let Ok(status) = sm.check_feature_status() {
        if !status.missing_settings.is_empty() || !status.warnings.is_empty() {
            tracing::warn!(
                "Missing settings: {:?}, warnings: {:?}",
                status.missing_settings,
                status.warnings
            );
        }
    }

    tracing::info!("Settings loaded (port={})", config.server_port);
    Ok((db, config, dir))
}

/// Create managed topics that are missing, then subscribe to every stored
/// topic. Returns how many subscriptions were started.
pub async fn start_subscriptions(state: &SharedState) -> Result<usize, anyhow::Error> {
    let (managed, default_server) = {
        let config = state.config().await;
        (config.managed_topics.clone(), config.default_server_url.clone())
    };
    let sync = sync_managed_topics(state.db(), &managed, &default_server)?;
    if !sync.created.is_empty() || sync.adopted > 0 || sync.released > 0 {
        tracing::info!(
            created = sync.created.len(),
            adopted = sync.adopted,
            released = sync.released,
            "Managed topics synchronized"
        );
    }

    let all = topics::all_client_topics(state.db())?;
    let started = state.coordinator().reconnect_all(&all);
    tracing::info!(topics = all.len(), started, "Subscriptions started");
    Ok(started)
}

/// Spawn all background tasks (non-fatal).
pub fn spawn_background_tasks(state: SharedState, channels: BackgroundChannels) {
    let BackgroundChannels { messages, power } = channels;

    let s = state.clone();
    tokio::spawn(async move {
        if let Err(e) = server::start_server(s).await {
            tracing::error!("Server failed: {e}");
        }
    });

    // Notification queue must be ready before the first message is handled
    let s = state.clone();
    tokio::spawn(async move {
        notification::initialize(&s).await;
        message_handler::run(s, messages).await;
    });

    let s = state.clone();
    tokio::spawn(async move { background::state_broadcast_loop(s).await });

    let s = state.clone();
    tokio::spawn(async move { background::power_event_loop(s, power).await });

    let s = state;
    tokio::spawn(async move { background::retention_cleanup_loop(s).await });
}

/// Determine the data directory for the application.
fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("NTFY_MENUBAR_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ntfy-menubar")
}

/// Load .env from multiple candidate paths.
fn load_dotenv() {
    let candidates = [".env", "../.env", "../../.env"];
    for path in &candidates {
        if dotenvy::from_filename(path).is_ok() {
            tracing::info!("Loaded .env from: {path}");
            return;
        }
    }
    tracing::info!("No .env file found, using system environment variables");
}
