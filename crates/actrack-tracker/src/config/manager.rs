//! Configuration manager

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use actrack_core::{
    models::{Config, PresenceConfig, TimerConfig},
    storage::{init_config_dir, ConfigStorage},
    Result as CoreResult,
};

/// Config manager error
#[derive(Debug, thiserror::Error)]
pub enum ConfigManagerError {
    #[error("Storage error: {0}")]
    Storage(#[from] actrack_core::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigManagerError>;

/// Changes to the timer section; `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct TimerConfigUpdate {
    pub tick_interval_ms: Option<u64>,
    pub auto_start_main: Option<bool>,
}

/// Changes to the presence section; `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct PresenceConfigUpdate {
    pub enabled: Option<bool>,
    pub endpoint: Option<String>,
    pub timeout_ms: Option<u64>,
    pub default_asset_key: Option<String>,
    pub guard_foreign_session: Option<bool>,
}

/// Manages application configuration
pub struct ConfigManager {
    storage: ConfigStorage,
    config: Arc<RwLock<Config>>,
}

impl ConfigManager {
    pub fn new() -> CoreResult<Self> {
        Self::with_dir(init_config_dir()?)
    }

    pub fn with_dir(config_dir: PathBuf) -> CoreResult<Self> {
        let storage = ConfigStorage::new(config_dir);

        // Load or create default config
        let config = storage.load()?;

        Ok(Self {
            storage,
            config: Arc::new(RwLock::new(config)),
        })
    }

    pub async fn get(&self) -> Config {
        self.config.read().await.clone()
    }

    pub async fn update(&self, config: Config) -> Result<Config> {
        config
            .validate()
            .map_err(|e| ConfigManagerError::Invalid(e.to_string()))?;

        self.storage.save(&config)?;

        {
            let mut current = self.config.write().await;
            *current = config.clone();
        }

        tracing::info!("Configuration updated");
        Ok(config)
    }

    pub async fn update_timer_config(&self, update: TimerConfigUpdate) -> Result<Config> {
        let mut config = self.get().await;
        apply_timer(&mut config.timer, update);
        self.update(config).await
    }

    pub async fn update_presence_config(&self, update: PresenceConfigUpdate) -> Result<Config> {
        let mut config = self.get().await;
        apply_presence(&mut config.presence, update);
        self.update(config).await
    }
}

fn apply_timer(timer: &mut TimerConfig, update: TimerConfigUpdate) {
    if let Some(ms) = update.tick_interval_ms {
        timer.tick_interval_ms = ms;
    }
    if let Some(enabled) = update.auto_start_main {
        timer.auto_start_main = enabled;
    }
}

fn apply_presence(presence: &mut PresenceConfig, update: PresenceConfigUpdate) {
    if let Some(enabled) = update.enabled {
        presence.enabled = enabled;
    }
    if let Some(endpoint) = update.endpoint {
        // an empty endpoint unsets it
        presence.endpoint = Some(endpoint).filter(|e| !e.trim().is_empty());
    }
    if let Some(ms) = update.timeout_ms {
        presence.timeout_ms = ms;
    }
    if let Some(key) = update.default_asset_key {
        presence.default_asset_key = key;
    }
    if let Some(guard) = update.guard_foreign_session {
        presence.guard_foreign_session = guard;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_manager(temp_dir: &TempDir) -> ConfigManager {
        ConfigManager::with_dir(temp_dir.path().join("config")).unwrap()
    }

    #[tokio::test]
    async fn test_get_config() {
        let temp_dir = TempDir::new().unwrap();
        let manager = create_manager(&temp_dir);
        let config = manager.get().await;
        assert_eq!(config.version, "1.0.0");
        assert_eq!(config.timer.tick_interval_ms, 1000);
        assert!(!config.presence.enabled);
        assert!(temp_dir.path().join("config/config.json").exists());
    }

    #[tokio::test]
    async fn test_update_timer_config() {
        let temp_dir = TempDir::new().unwrap();
        let manager = create_manager(&temp_dir);

        let updated = manager
            .update_timer_config(TimerConfigUpdate {
                tick_interval_ms: Some(250),
                auto_start_main: Some(true),
            })
            .await
            .unwrap();
        assert_eq!(updated.timer.tick_interval_ms, 250);
        assert!(updated.timer.auto_start_main);

        // persisted across managers
        let reloaded = create_manager(&temp_dir).get().await;
        assert_eq!(reloaded.timer, updated.timer);
    }

    #[tokio::test]
    async fn test_invalid_update_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let manager = create_manager(&temp_dir);

        let result = manager
            .update_timer_config(TimerConfigUpdate {
                tick_interval_ms: Some(5),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(ConfigManagerError::Invalid(_))));

        // enabling presence without an endpoint is invalid
        let result = manager
            .update_presence_config(PresenceConfigUpdate {
                enabled: Some(true),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(ConfigManagerError::Invalid(_))));
        assert_eq!(manager.get().await, Config::default());
    }

    #[tokio::test]
    async fn test_update_presence_config() {
        let temp_dir = TempDir::new().unwrap();
        let manager = create_manager(&temp_dir);

        let updated = manager
            .update_presence_config(PresenceConfigUpdate {
                enabled: Some(true),
                endpoint: Some("http://localhost:5000".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(updated.presence.enabled);
        assert_eq!(
            updated.presence.endpoint.as_deref(),
            Some("http://localhost:5000")
        );

        let updated = manager
            .update_presence_config(PresenceConfigUpdate {
                enabled: Some(false),
                endpoint: Some(String::new()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.presence.endpoint, None);
    }
}
