use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::{ConfigError, ExchangeConfig};

/// Persistence boundary for exchange settings.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_exchange_config(&self, name: &str) -> Result<ExchangeConfig, ConfigError>;
    async fn update_exchange_config(&self, config: ExchangeConfig) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub exchanges: Vec<ExchangeConfig>,
}

impl BotConfig {
    pub fn exchange(&self, name: &str) -> Option<&ExchangeConfig> {
        self.exchanges
            .iter()
            .find(|exchange| exchange.name.eq_ignore_ascii_case(name))
    }

    fn replace_exchange(&mut self, config: ExchangeConfig) -> Result<(), ConfigError> {
        let slot = self
            .exchanges
            .iter_mut()
            .find(|exchange| exchange.name.eq_ignore_ascii_case(&config.name))
            .ok_or_else(|| ConfigError::ExchangeNotFound(config.name.clone()))?;
        *slot = config;
        Ok(())
    }
}

/// YAML file backed store. Updates are written to disk before the in-memory copy changes.
#[derive(Debug)]
pub struct YamlConfigStore {
    path: PathBuf,
    state: RwLock<BotConfig>,
}

impl YamlConfigStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
        let state: BotConfig = serde_yaml::from_str(&contents)?;
        debug!(path = %path.display(), exchanges = state.exchanges.len(), "loaded exchange config");

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_file(&self, config: &BotConfig) -> Result<(), ConfigError> {
        let rendered = serde_yaml::to_string(config)?;
        let tmp_path = self.path.with_extension("yaml.tmp");
        let io_err = |source| ConfigError::Io {
            path: self.path.clone(),
            source,
        };

        tokio::fs::write(&tmp_path, rendered).await.map_err(io_err)?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for YamlConfigStore {
    async fn get_exchange_config(&self, name: &str) -> Result<ExchangeConfig, ConfigError> {
        self.state
            .read()
            .await
            .exchange(name)
            .cloned()
            .ok_or_else(|| ConfigError::ExchangeNotFound(name.to_string()))
    }

    async fn update_exchange_config(&self, config: ExchangeConfig) -> Result<(), ConfigError> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        next.replace_exchange(config)?;
        self.write_file(&next).await?;
        *state = next;
        Ok(())
    }
}
