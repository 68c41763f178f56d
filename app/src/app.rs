use std::path::PathBuf;
use std::sync::Arc;

use ntfy_client::{Coordinator, CoordinatorConfig, PowerEvent, TopicMessage};
use ntfy_db::Database;
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, SettingsManager};
use crate::credentials::DbCredentials;

const WS_CHANNEL_CAPACITY: usize = 2048;
const POWER_CHANNEL_CAPACITY: usize = 16;

/// Application shared state accessible from axum handlers and background tasks.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<SharedStateInner>,
}

struct SharedStateInner {
    /// Broadcast channel for WebSocket messages
    ws_tx: broadcast::Sender<String>,
    /// Application configuration (reloadable)
    config: RwLock<AppConfig>,
    /// Database handle
    db: Database,
    /// Data directory path
    data_dir: PathBuf,
    coordinator: Coordinator,
    /// Cancelled once at shutdown; every background loop watches it
    shutdown: CancellationToken,
    power_tx: mpsc::Sender<PowerEvent>,
}

/// Receiving ends handed to the background tasks.
pub struct BackgroundChannels {
    pub messages: mpsc::Receiver<TopicMessage>,
    pub power: mpsc::Receiver<PowerEvent>,
}

impl SharedState {
    /// Create shared state from an already-opened database and loaded config.
    pub fn new(
        db: Database,
        config: AppConfig,
        data_dir: PathBuf,
    ) -> Result<(Self, BackgroundChannels), anyhow::Error> {
        let (ws_tx, _) = broadcast::channel(WS_CHANNEL_CAPACITY);
        let (power_tx, power_rx) = mpsc::channel(POWER_CHANNEL_CAPACITY);

        let coordinator_config = CoordinatorConfig {
            keepalive_timeout: config.keepalive_timeout(),
            ..CoordinatorConfig::default()
        };
        let (coordinator, messages) =
            Coordinator::new(coordinator_config, Arc::new(DbCredentials::new(db.clone())))?;

        let state = Self {
            inner: Arc::new(SharedStateInner {
                ws_tx,
                config: RwLock::new(config),
                db,
                data_dir,
                coordinator,
                shutdown: CancellationToken::new(),
                power_tx,
            }),
        };
        let channels = BackgroundChannels {
            messages,
            power: power_rx,
        };
        Ok((state, channels))
    }

    pub fn server_port(&self) -> u16 {
        // Read from config; fallback to the default port.
        self.inner
            .config
            .try_read()
            .map(|c| c.server_port)
            .unwrap_or(8093)
    }

    pub fn ws_sender(&self) -> &broadcast::Sender<String> {
        &self.inner.ws_tx
    }

    pub fn subscribe_ws(&self) -> broadcast::Receiver<String> {
        self.inner.ws_tx.subscribe()
    }

    /// Push a `{type, data}` frame to every WebSocket client.
    pub fn broadcast_ws(&self, kind: &str, data: serde_json::Value) {
        let frame = serde_json::json!({ "type": kind, "data": data });
        let _ = self.inner.ws_tx.send(frame.to_string());
    }

    pub fn db(&self) -> &Database {
        &self.inner.db
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.inner.data_dir
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.inner.coordinator
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown
    }

    /// Forward a sleep/wake notification to the power loop.
    pub async fn send_power_event(&self, event: PowerEvent) -> Result<(), anyhow::Error> {
        self.inner
            .power_tx
            .send(event)
            .await
            .map_err(|_| anyhow::anyhow!("power event loop is not running"))
    }

    /// Get a read lock on the current config.
    pub async fn config(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.config.read().await
    }

    /// Reload config from the database.
    pub async fn reload_config(&self) -> Result<(), anyhow::Error> {
        let sm = SettingsManager::new(self.inner.db.clone());
        let mut config = self.inner.config.write().await;
        config.reload(&sm)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_state() -> (SharedState, BackgroundChannels) {
    let db = Database::open_in_memory().expect("in-memory db");
    let sm = SettingsManager::new(db.clone());
    sm.initialize_defaults().expect("defaults");
    let config = AppConfig::load(&sm).expect("config");
    SharedState::new(db, config, PathBuf::from(".")).expect("state")
}
