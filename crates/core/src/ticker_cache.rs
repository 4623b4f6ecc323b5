use std::sync::Arc;

use dashmap::DashMap;

use crate::types::{TickerSnapshot, TradingPair};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TickerKey {
    pub exchange: String,
    pub base: String,
    pub quote: String,
}

impl TickerKey {
    pub fn new(exchange: &str, base: &str, quote: &str) -> Self {
        Self {
            exchange: exchange.to_ascii_lowercase(),
            base: base.to_ascii_uppercase(),
            quote: quote.to_ascii_uppercase(),
        }
    }

    fn for_pair(exchange: &str, pair: &TradingPair) -> Self {
        Self::new(exchange, &pair.base, &pair.quote)
    }
}

/// Latest ticker per (exchange, base, quote).
///
/// Cloning yields another handle to the same map. Writes to distinct keys land on
/// independent shards; writes to the same key are last-writer-wins.
#[derive(Debug, Clone, Default)]
pub struct TickerCache {
    entries: Arc<DashMap<TickerKey, Arc<TickerSnapshot>>>,
}

impl TickerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, exchange: &str, snapshot: TickerSnapshot) {
        let key = TickerKey::for_pair(exchange, &snapshot.pair);
        self.entries.insert(key, Arc::new(snapshot));
    }

    pub fn get(&self, exchange: &str, base: &str, quote: &str) -> Option<Arc<TickerSnapshot>> {
        self.entries
            .get(&TickerKey::new(exchange, base, quote))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn get_pair(&self, exchange: &str, pair: &TradingPair) -> Option<Arc<TickerSnapshot>> {
        self.get(exchange, &pair.base, &pair.quote)
    }

    pub fn exchange_snapshots(&self, exchange: &str) -> Vec<Arc<TickerSnapshot>> {
        let exchange = exchange.to_ascii_lowercase();
        self.entries
            .iter()
            .filter(|entry| entry.key().exchange == exchange)
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
