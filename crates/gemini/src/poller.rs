//! Periodic ticker refresh for every enabled pair.
//!
//! Each cycle spawns one task per pair and then sleeps without joining them, so a
//! slow cycle can overlap the next one. Two tasks may then write the same cache key;
//! the later write wins. Ticker GETs are idempotent, so this race is benign.
//!
//! A semaphore bounds the tasks alive across overlapping cycles. The permit is
//! taken before a task is spawned; when none is free the pair is skipped for that
//! cycle, so a stalled exchange never builds a backlog of waiting tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bot_core::config::{ExchangeConfig, DEFAULT_MAX_CONCURRENT_REQUESTS};
use bot_core::store::ConfigStore;
use bot_core::ticker_cache::TickerCache;
use bot_core::types::{TickerSnapshot, TradingPair};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

use crate::client::GeminiRestClient;
use crate::reconcile::{reconcile_available_pairs, ReconcileOutcome};

pub struct TickerPoller {
    client: Arc<GeminiRestClient>,
    store: Arc<dyn ConfigStore>,
    cache: TickerCache,
    exchange: ExchangeConfig,
    interval: Duration,
    limiter: Arc<Semaphore>,
    enabled: Arc<AtomicBool>,
}

impl TickerPoller {
    pub fn new(
        client: GeminiRestClient,
        store: Arc<dyn ConfigStore>,
        cache: TickerCache,
        exchange: ExchangeConfig,
    ) -> Self {
        let interval = exchange.polling_interval();
        Self {
            client: Arc::new(client),
            store,
            cache,
            exchange,
            interval,
            limiter: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_REQUESTS)),
            enabled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_max_concurrent_requests(mut self, limit: usize) -> Self {
        self.limiter = Arc::new(Semaphore::new(limit.max(1)));
        self
    }

    /// Override the configured polling delay.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Enabled pairs that parse as a trading pair; others are logged and skipped.
    pub fn enabled_pairs(&self) -> Vec<TradingPair> {
        self.exchange
            .enabled_pairs()
            .iter()
            .filter_map(|symbol| match TradingPair::from_symbol(symbol) {
                Ok(pair) => Some(pair),
                Err(err) => {
                    warn!(exchange = %self.exchange.name, error = %err, "skipping enabled pair");
                    None
                }
            })
            .collect()
    }

    pub fn spawn(self) -> PollerHandle {
        self.enabled.store(true, Ordering::Release);
        let enabled = Arc::clone(&self.enabled);
        let task = tokio::spawn(async move { self.run().await });
        PollerHandle { enabled, task }
    }

    async fn run(self) {
        let pairs = self.enabled_pairs();
        if self.exchange.verbose {
            info!(
                exchange = %self.exchange.name,
                polling_secs = self.interval.as_secs(),
                "polling delay"
            );
            info!(
                exchange = %self.exchange.name,
                count = pairs.len(),
                pairs = ?self.exchange.enabled_pairs(),
                "currencies enabled"
            );
        }

        let outcome = reconcile_available_pairs(
            &self.client,
            self.store.as_ref(),
            &self.exchange.available_pairs(),
        )
        .await;
        if let ReconcileOutcome::Updated(ref updated) = outcome {
            info!(exchange = %self.exchange.name, count = updated.len(), "available pairs reconciled");
        }

        while self.enabled.load(Ordering::Acquire) {
            self.spawn_refresh_cycle(&pairs);
            tokio::time::sleep(self.interval).await;
        }

        info!(exchange = %self.exchange.name, "ticker polling stopped");
    }

    /// Launch one fetch-and-publish task per enabled pair without waiting for them.
    /// Pairs that find every permit taken are skipped until the next cycle.
    pub fn refresh_cycle(&self) -> Vec<JoinHandle<()>> {
        self.spawn_refresh_cycle(&self.enabled_pairs())
    }

    fn spawn_refresh_cycle(&self, pairs: &[TradingPair]) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let Ok(permit) = Arc::clone(&self.limiter).try_acquire_owned() else {
                warn!(
                    exchange = %self.client.name(),
                    pair = %pair.as_symbol(),
                    "refresh limit reached, skipping pair this cycle"
                );
                continue;
            };
            let client = Arc::clone(&self.client);
            let cache = self.cache.clone();
            handles.push(tokio::spawn(refresh_pair(
                client,
                cache,
                permit,
                pair.clone(),
            )));
        }
        handles
    }
}

async fn refresh_pair(
    client: Arc<GeminiRestClient>,
    cache: TickerCache,
    _permit: OwnedSemaphorePermit,
    pair: TradingPair,
) {
    match client.get_ticker(&pair).await {
        Ok(ticker) => {
            let snapshot = TickerSnapshot::from(ticker);
            info!(
                exchange = %client.name(),
                pair = %pair.as_symbol(),
                last = snapshot.last,
                bid = snapshot.bid,
                ask = snapshot.ask,
                volume = snapshot.volume,
                "ticker refreshed"
            );
            cache.publish(client.name(), snapshot);
        }
        Err(err) => {
            warn!(exchange = %client.name(), pair = %pair.as_symbol(), error = %err, "failed to refresh ticker");
        }
    }
}

/// Control handle for a running poller.
#[derive(Debug)]
pub struct PollerHandle {
    enabled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop scheduling new cycles. The loop exits at its next interval boundary and
    /// tasks already in flight run to completion.
    pub fn stop(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.enabled.load(Ordering::Acquire) && !self.task.is_finished()
    }

    pub async fn join(self) -> Result<(), JoinError> {
        self.task.await
    }
}
