pub mod config;
pub mod store;
pub mod ticker_cache;
pub mod types;

pub use config::{AppSettings, ConfigError, Credentials, ExchangeConfig};
pub use store::{BotConfig, ConfigStore, YamlConfigStore};
pub use ticker_cache::TickerCache;
pub use types::{TickerSnapshot, TradingPair};
