use std::collections::HashMap;

use bot_core::types::{OrderSide, TickerSnapshot, TradingPair};
use serde::{Deserialize, Serialize};

use crate::error::{GeminiError, Result};

/// Prices, quantities and amounts arrive as JSON strings.
pub(crate) mod string_f64 {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.trim().parse::<f64>().map_err(de::Error::custom)
    }

    pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderbookEntry {
    #[serde(with = "string_f64")]
    pub price: f64,
    #[serde(with = "string_f64")]
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Orderbook {
    pub bids: Vec<OrderbookEntry>,
    pub asks: Vec<OrderbookEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Trade {
    pub timestamp: i64,
    #[serde(default)]
    pub timestampms: Option<i64>,
    pub tid: i64,
    #[serde(with = "string_f64")]
    pub price: f64,
    #[serde(with = "string_f64")]
    pub amount: f64,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(rename = "type", default)]
    pub side: String,
    #[serde(default)]
    pub broken: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Auction {
    #[serde(with = "string_f64")]
    pub last_auction_price: f64,
    #[serde(with = "string_f64")]
    pub last_auction_quantity: f64,
    #[serde(with = "string_f64")]
    pub last_highest_bid_price: f64,
    #[serde(with = "string_f64")]
    pub last_lowest_ask_price: f64,
    pub next_update_ms: i64,
    pub next_auction_ms: i64,
    pub last_auction_eid: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AuctionHistory {
    pub auction_id: i64,
    #[serde(with = "string_f64")]
    pub auction_price: f64,
    #[serde(with = "string_f64")]
    pub auction_quantity: f64,
    pub eid: i64,
    #[serde(with = "string_f64")]
    pub highest_bid_price: f64,
    #[serde(with = "string_f64")]
    pub lowest_ask_price: f64,
    pub auction_result: String,
    pub timestamp: i64,
    pub timestampms: i64,
    pub event_type: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Order {
    pub order_id: i64,
    #[serde(default)]
    pub client_order_id: Option<String>,
    pub symbol: String,
    pub exchange: String,
    #[serde(with = "string_f64")]
    pub price: f64,
    #[serde(with = "string_f64")]
    pub avg_execution_price: f64,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: String,
    pub timestamp: i64,
    pub timestampms: i64,
    pub is_live: bool,
    pub is_cancelled: bool,
    #[serde(default)]
    pub was_forced: bool,
    #[serde(with = "string_f64")]
    pub executed_amount: f64,
    #[serde(with = "string_f64")]
    pub remaining_amount: f64,
    #[serde(with = "string_f64")]
    pub original_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CancelDetails {
    #[serde(rename = "cancelledOrders", default)]
    pub cancelled_orders: Vec<i64>,
    #[serde(rename = "cancelRejects", default)]
    pub cancel_rejects: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CancelAllResult {
    pub result: String,
    #[serde(default)]
    pub details: Option<CancelDetails>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TradeHistory {
    #[serde(with = "string_f64")]
    pub price: f64,
    #[serde(with = "string_f64")]
    pub amount: f64,
    pub timestamp: i64,
    pub timestampms: i64,
    #[serde(rename = "type")]
    pub side: String,
    pub fee_currency: String,
    #[serde(with = "string_f64")]
    pub fee_amount: f64,
    pub tid: i64,
    pub order_id: i64,
    #[serde(default)]
    pub client_order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Balance {
    pub currency: String,
    #[serde(with = "string_f64")]
    pub amount: f64,
    #[serde(with = "string_f64")]
    pub available: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HeartbeatResponse {
    pub result: String,
}

impl HeartbeatResponse {
    pub fn is_ok(&self) -> bool {
        self.result.eq_ignore_ascii_case("ok")
    }
}

/// Body of a non-2xx response, e.g. `{"result":"error","reason":"InvalidNonce",...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub result: String,
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    #[serde(rename = "exchange limit")]
    ExchangeLimit,
    #[serde(rename = "exchange stop limit")]
    ExchangeStopLimit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::ExchangeLimit => "exchange limit",
            OrderType::ExchangeStopLimit => "exchange stop limit",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderRequest {
    pub symbol: String,
    pub amount: f64,
    pub price: f64,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub client_order_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderbookQuery {
    pub limit_bids: Option<u32>,
    pub limit_asks: Option<u32>,
}

impl OrderbookQuery {
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit_bids {
            pairs.push(("limit_bids", limit.to_string()));
        }
        if let Some(limit) = self.limit_asks {
            pairs.push(("limit_asks", limit.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradesQuery {
    pub since: Option<i64>,
    pub limit_trades: Option<u32>,
    pub include_breaks: Option<bool>,
}

impl TradesQuery {
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(since) = self.since {
            pairs.push(("since", since.to_string()));
        }
        if let Some(limit) = self.limit_trades {
            pairs.push(("limit_trades", limit.to_string()));
        }
        if let Some(include) = self.include_breaks {
            pairs.push(("include_breaks", include.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuctionHistoryQuery {
    pub since: Option<i64>,
    pub limit_auction_results: Option<u32>,
    pub include_indicative: Option<bool>,
}

impl AuctionHistoryQuery {
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(since) = self.since {
            pairs.push(("since", since.to_string()));
        }
        if let Some(limit) = self.limit_auction_results {
            pairs.push(("limit_auction_results", limit.to_string()));
        }
        if let Some(include) = self.include_indicative {
            pairs.push(("include_indicative", include.to_string()));
        }
        pairs
    }
}

/// A volume entry is a decimal string, except `timestamp` which is a number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum VolumeValue {
    Number(f64),
    Text(String),
}

impl VolumeValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            VolumeValue::Number(number) => Some(*number),
            VolumeValue::Text(text) => text.trim().parse().ok(),
        }
    }
}

/// Raw `pubticker` body; `volume` keys depend on the pair.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTicker {
    #[serde(deserialize_with = "string_f64::deserialize")]
    pub ask: f64,
    #[serde(deserialize_with = "string_f64::deserialize")]
    pub bid: f64,
    #[serde(deserialize_with = "string_f64::deserialize")]
    pub last: f64,
    volume: HashMap<String, VolumeValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerVolume {
    pub base: f64,
    pub quote: f64,
    pub usd: Option<f64>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticker {
    pub pair: TradingPair,
    pub ask: f64,
    pub bid: f64,
    pub last: f64,
    pub volume: TickerVolume,
}

impl RawTicker {
    /// Project the pair specific volume keys into a typed ticker.
    pub fn into_ticker(self, pair: &TradingPair) -> Result<Ticker> {
        let lookup = |key: &str| -> Result<f64> {
            self.volume
                .get(key)
                .and_then(VolumeValue::as_f64)
                .ok_or_else(|| GeminiError::MissingField(format!("volume.{key}")))
        };

        let base = lookup(&pair.base)?;
        let quote = lookup(&pair.quote)?;
        let usd = lookup("USD").ok();
        let timestamp = lookup("timestamp")? as i64;

        Ok(Ticker {
            pair: pair.clone(),
            ask: self.ask,
            bid: self.bid,
            last: self.last,
            volume: TickerVolume {
                base,
                quote,
                usd,
                timestamp,
            },
        })
    }
}

impl From<Ticker> for TickerSnapshot {
    fn from(value: Ticker) -> Self {
        Self {
            pair: value.pair,
            ask: value.ask,
            bid: value.bid,
            last: value.last,
            volume: value.volume.quote,
            base_volume: value.volume.base,
            reference_volume: value.volume.usd,
            timestamp_ms: value.volume.timestamp,
        }
    }
}
