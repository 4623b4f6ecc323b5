use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use bot_core::config::{load_app_settings, AppSettings, ExchangeConfig, DEFAULT_EXCHANGE_NAME};
use bot_core::store::{ConfigStore, YamlConfigStore};
use bot_core::ticker_cache::TickerCache;
use bot_core::types::TradingPair;
use clap::{Parser, Subcommand};
use gemini::models::{AuctionHistoryQuery, OrderbookQuery, TradesQuery};
use gemini::{GeminiRestClient, TickerPoller};
use serde::Serialize;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

const API_KEY_VAR: &str = "GEMINI_API_KEY";
const API_SECRET_VAR: &str = "GEMINI_API_SECRET";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "trader-cli", about = "Gemini REST client and ticker poller", version)]
struct Cli {
    /// Application settings file (YAML)
    #[arg(long, env = "GEMINI_BOT_SETTINGS")]
    settings: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List every symbol the exchange publishes
    Symbols,
    /// Latest ticker for a pair
    Ticker {
        /// Pair symbol, e.g. BTCUSD
        #[arg(long, short = 's')]
        symbol: String,
    },
    /// Current order book
    Book {
        #[arg(long, short = 's')]
        symbol: String,
        #[arg(long)]
        limit_bids: Option<u32>,
        #[arg(long)]
        limit_asks: Option<u32>,
    },
    /// Recent public trades
    Trades {
        #[arg(long, short = 's')]
        symbol: String,
        /// Only trades after this timestamp (seconds)
        #[arg(long)]
        since: Option<i64>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Current auction state
    Auction {
        #[arg(long, short = 's')]
        symbol: String,
    },
    /// Past auction results
    AuctionHistory {
        #[arg(long, short = 's')]
        symbol: String,
        #[arg(long)]
        since: Option<i64>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Account balances (authenticated)
    Balances,
    /// Active orders (authenticated)
    Orders,
    /// Status of a single order (authenticated)
    OrderStatus {
        #[arg(long)]
        order_id: i64,
    },
    /// Your trades for a symbol (authenticated)
    MyTrades {
        #[arg(long, short = 's')]
        symbol: String,
        #[arg(long)]
        since: Option<i64>,
    },
    /// Session heartbeat (authenticated)
    Heartbeat,
    /// Poll tickers for every enabled pair until Ctrl-C
    Poll,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = load_app_settings(cli.settings.as_deref());
    init_tracing(
        loaded
            .as_ref()
            .ok()
            .and_then(|settings| settings.log_dir.as_deref()),
    );
    let settings = loaded.unwrap_or_else(|err| {
        warn!("failed to load settings: {err}, using defaults");
        AppSettings::default()
    });

    match cli.command {
        Commands::Poll => run_poller(&settings).await,
        command => run_command(command, &settings).await,
    }
}

async fn run_command(command: Commands, settings: &AppSettings) -> Result<()> {
    let exchange = match YamlConfigStore::open(&settings.exchange_config_path).await {
        Ok(store) => store
            .get_exchange_config(DEFAULT_EXCHANGE_NAME)
            .await?
            .with_env_credentials(API_KEY_VAR, API_SECRET_VAR),
        Err(err) => {
            warn!(error = %err, "exchange config unavailable, using defaults");
            ExchangeConfig::from_env_credentials(API_KEY_VAR, API_SECRET_VAR)
        }
    };
    let client = GeminiRestClient::from_config(&exchange, settings)?;

    match command {
        Commands::Symbols => print_json(&client.get_symbols().await?)?,
        Commands::Ticker { symbol } => {
            let pair = TradingPair::from_symbol(&symbol)?;
            print_json(&client.get_ticker(&pair).await?)?;
        }
        Commands::Book {
            symbol,
            limit_bids,
            limit_asks,
        } => {
            let query = OrderbookQuery {
                limit_bids,
                limit_asks,
            };
            print_json(&client.get_orderbook(&symbol.to_lowercase(), &query).await?)?;
        }
        Commands::Trades {
            symbol,
            since,
            limit,
        } => {
            let query = TradesQuery {
                since,
                limit_trades: limit,
                include_breaks: None,
            };
            print_json(&client.get_trades(&symbol.to_lowercase(), &query).await?)?;
        }
        Commands::Auction { symbol } => {
            print_json(&client.get_auction(&symbol.to_lowercase()).await?)?
        }
        Commands::AuctionHistory {
            symbol,
            since,
            limit,
        } => {
            let query = AuctionHistoryQuery {
                since,
                limit_auction_results: limit,
                include_indicative: None,
            };
            print_json(
                &client
                    .get_auction_history(&symbol.to_lowercase(), &query)
                    .await?,
            )?;
        }
        Commands::Balances => print_json(&client.get_account_info().await?)?,
        Commands::Orders => print_json(&client.get_active_orders().await?)?,
        Commands::OrderStatus { order_id } => {
            print_json(&client.get_order_status(order_id).await?)?
        }
        Commands::MyTrades { symbol, since } => {
            print_json(&client.get_trade_history(&symbol.to_lowercase(), since).await?)?
        }
        Commands::Heartbeat => println!("{}", client.post_heartbeat().await?),
        Commands::Poll => return run_poller(settings).await,
    }

    Ok(())
}

async fn run_poller(settings: &AppSettings) -> Result<()> {
    let store = YamlConfigStore::open(&settings.exchange_config_path)
        .await
        .with_context(|| format!("failed to open {}", settings.exchange_config_path))?;
    let exchange = store
        .get_exchange_config(DEFAULT_EXCHANGE_NAME)
        .await?
        .with_env_credentials(API_KEY_VAR, API_SECRET_VAR);

    if !exchange.enabled {
        info!(exchange = %exchange.name, "exchange disabled, nothing to poll");
        return Ok(());
    }

    let client = GeminiRestClient::from_config(&exchange, settings)?;
    let store: Arc<dyn ConfigStore> = Arc::new(store);
    let handle = TickerPoller::new(client, store, TickerCache::new(), exchange)
        .with_max_concurrent_requests(settings.max_concurrent_requests)
        .spawn();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutdown requested");
    handle.stop();
    handle.join().await.context("poller task failed")?;

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing(log_dir: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=info,hyper=info"));
    let fmt_stdout = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let fmt_file = log_dir.and_then(|dir| {
        let log_dir = PathBuf::from(dir);
        if let Err(err) = fs::create_dir_all(&log_dir) {
            eprintln!("failed to create log directory {log_dir:?}: {err}");
            return None;
        }
        let file_appender: RollingFileAppender =
            tracing_appender::rolling::daily(log_dir, "trader-cli.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
    });

    let subscriber = Registry::default()
        .with(env_filter)
        .with(fmt_stdout)
        .with(fmt_file);

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("tracing already initialised");
    }
}
