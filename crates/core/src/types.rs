use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const BASE_SYMBOL_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid trading pair symbol {0:?}: expected a 3 letter base followed by a quote")]
pub struct PairError(pub String);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TradingPair {
    pub base: String,
    pub quote: String,
}

impl TradingPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }

    /// Split an exchange symbol such as `btcusd` into `BTC` / `USD`.
    pub fn from_symbol(symbol: &str) -> Result<Self, PairError> {
        let symbol = symbol.trim();
        let valid = symbol.len() > BASE_SYMBOL_LEN
            && symbol.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid {
            return Err(PairError(symbol.to_string()));
        }

        let (base, quote) = symbol.split_at(BASE_SYMBOL_LEN);
        Ok(Self::new(base, quote))
    }

    pub fn as_symbol(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.base, self.quote)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

/// One ticker reading for one pair, shared across exchanges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    pub pair: TradingPair,
    pub ask: f64,
    pub bid: f64,
    pub last: f64,
    /// Traded volume in the quote currency.
    pub volume: f64,
    pub base_volume: f64,
    /// Traded volume in USD, when the exchange reports it.
    pub reference_volume: Option<f64>,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountCurrencyInfo {
    pub currency: String,
    pub total: f64,
    pub available: f64,
}

impl AccountCurrencyInfo {
    pub fn on_hold(&self) -> f64 {
        (self.total - self.available).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub exchange: String,
    pub currencies: Vec<AccountCurrencyInfo>,
}
