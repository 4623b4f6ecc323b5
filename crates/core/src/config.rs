use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use ::config::{Config, ConfigError as BuilderError, Environment, File};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_EXCHANGE_NAME: &str = "Gemini";
pub const DEFAULT_POLLING_DELAY_SECS: u64 = 10;
pub const DEFAULT_EXCHANGE_CONFIG_PATH: &str = "config/config.yaml";
pub const DEFAULT_APP_SETTINGS_PATH: &str = "config/app.yaml";
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration load failed: {0}")]
    Load(#[from] BuilderError),
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid yaml config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("exchange {0} not found in config")]
    ExchangeNotFound(String),
}

/// API key pair for an exchange account. The secret is only ever used as an HMAC key.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_secret.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Persisted per-exchange settings. Pair lists are stored comma separated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub websocket: bool,
    #[serde(default)]
    pub authenticated_api_support: bool,
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(default = "default_polling_delay")]
    pub rest_polling_delay: u64,
    #[serde(default)]
    pub available_pairs: String,
    #[serde(default)]
    pub enabled_pairs: String,
    #[serde(default)]
    pub base_currencies: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_EXCHANGE_NAME.to_string(),
            enabled: false,
            verbose: false,
            websocket: false,
            authenticated_api_support: false,
            credentials: Credentials::default(),
            rest_polling_delay: DEFAULT_POLLING_DELAY_SECS,
            available_pairs: String::new(),
            enabled_pairs: String::new(),
            base_currencies: String::new(),
        }
    }
}

impl ExchangeConfig {
    pub fn available_pairs(&self) -> Vec<String> {
        split_list(&self.available_pairs)
    }

    pub fn enabled_pairs(&self) -> Vec<String> {
        split_list(&self.enabled_pairs)
    }

    pub fn base_currencies(&self) -> Vec<String> {
        split_list(&self.base_currencies)
    }

    pub fn set_available_pairs<S: AsRef<str>>(&mut self, pairs: &[S]) {
        self.available_pairs = join_list(pairs);
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.rest_polling_delay)
    }

    /// Overlay credentials from the environment, leaving the persisted ones untouched on miss.
    pub fn with_env_credentials(mut self, key_var: &str, secret_var: &str) -> Self {
        if let Some(credentials) = load_credentials_from_env(key_var, secret_var) {
            self.credentials = credentials;
        }
        self
    }

    /// Default record for when no exchange config exists. Complete environment
    /// credentials switch on the authenticated API.
    pub fn from_env_credentials(key_var: &str, secret_var: &str) -> Self {
        let mut config = Self::default().with_env_credentials(key_var, secret_var);
        config.authenticated_api_support = config.credentials.is_complete();
        config
    }
}

fn default_polling_delay() -> u64 {
    DEFAULT_POLLING_DELAY_SECS
}

pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| item.as_ref())
        .collect::<Vec<_>>()
        .join(",")
}

/// Process level settings for the trader binary.
#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    #[serde(default = "default_exchange_config_path")]
    pub exchange_config_path: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default)]
    pub http_proxy: Option<String>,
    #[serde(default)]
    pub https_proxy: Option<String>,
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            exchange_config_path: default_exchange_config_path(),
            base_url: None,
            request_timeout_secs: None,
            max_concurrent_requests: default_max_concurrent_requests(),
            http_proxy: None,
            https_proxy: None,
            log_dir: None,
        }
    }
}

impl AppSettings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

fn default_exchange_config_path() -> String {
    DEFAULT_EXCHANGE_CONFIG_PATH.to_string()
}

fn default_max_concurrent_requests() -> usize {
    DEFAULT_MAX_CONCURRENT_REQUESTS
}

/// Load settings from an optional YAML file plus `GEMINI_BOT__*` environment overrides.
pub fn load_app_settings(path: Option<&str>) -> Result<AppSettings, ConfigError> {
    preload_env_files();

    let path = path.unwrap_or(DEFAULT_APP_SETTINGS_PATH);
    let settings: AppSettings = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(Environment::with_prefix("GEMINI_BOT").separator("__"))
        .build()?
        .try_deserialize()?;

    Ok(settings)
}

pub fn load_credentials_from_env(key_var: &str, secret_var: &str) -> Option<Credentials> {
    match (env_var_non_empty(key_var), env_var_non_empty(secret_var)) {
        (Ok(api_key), Ok(api_secret)) => Some(Credentials {
            api_key,
            api_secret,
        }),
        _ => None,
    }
}

fn env_var_non_empty(key: &str) -> Result<String, env::VarError> {
    let value = env::var(key)?;
    if value.trim().is_empty() {
        return Err(env::VarError::NotPresent);
    }
    Ok(value)
}

fn preload_env_files() {
    let _ = dotenv();

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let candidate = manifest_dir.join("../../.env");
    if candidate.exists() {
        let _ = dotenvy::from_path(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_gemini_exchange() {
        let config = ExchangeConfig::default();
        assert_eq!(config.name, "Gemini");
        assert!(!config.enabled);
        assert!(!config.verbose);
        assert_eq!(config.polling_interval(), Duration::from_secs(10));
    }

    #[test]
    fn pair_lists_split_and_join() {
        let mut config = ExchangeConfig {
            enabled_pairs: " BTCUSD, ETHUSD,,".into(),
            ..Default::default()
        };
        assert_eq!(config.enabled_pairs(), vec!["BTCUSD", "ETHUSD"]);

        config.set_available_pairs(&["BTCUSD", "ETHBTC"]);
        assert_eq!(config.available_pairs, "BTCUSD,ETHBTC");
        assert!(config.base_currencies().is_empty());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let credentials = Credentials::new("public-key", "very-secret");
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("public-key"));
        assert!(!rendered.contains("very-secret"));
    }

    #[test]
    fn env_credentials_enable_auth_without_a_config_record() {
        env::set_var("BOT_CORE_TEST_KEY", "env-key");
        env::set_var("BOT_CORE_TEST_SECRET", "env-secret");
        let config =
            ExchangeConfig::from_env_credentials("BOT_CORE_TEST_KEY", "BOT_CORE_TEST_SECRET");
        assert!(config.authenticated_api_support);
        assert_eq!(config.credentials, Credentials::new("env-key", "env-secret"));

        env::set_var("BOT_CORE_TEST_BLANK_SECRET", " ");
        let config =
            ExchangeConfig::from_env_credentials("BOT_CORE_TEST_KEY", "BOT_CORE_TEST_BLANK_SECRET");
        assert!(!config.authenticated_api_support);
        assert!(!config.credentials.is_complete());
    }

    #[test]
    fn exchange_config_reads_flat_yaml() {
        let yaml = r#"
name: Gemini
enabled: true
authenticated_api_support: true
api_key: key
api_secret: secret
rest_polling_delay: 5
available_pairs: BTCUSD,ETHUSD
enabled_pairs: BTCUSD
"#;
        let config: ExchangeConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.enabled);
        assert_eq!(config.credentials, Credentials::new("key", "secret"));
        assert_eq!(config.rest_polling_delay, 5);
        assert_eq!(config.available_pairs(), vec!["BTCUSD", "ETHUSD"]);
        assert!(!config.verbose);
    }
}
