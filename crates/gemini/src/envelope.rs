use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::warn;

use crate::error::{GeminiError, Result};

pub const REQUEST_KEY: &str = "request";
pub const NONCE_KEY: &str = "nonce";

/// A JSON primitive accepted as an authenticated request parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

pub type Params = BTreeMap<String, ParamValue>;

/// Build a [`Params`] map from `key => value` pairs.
#[macro_export]
macro_rules! params {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let mut map = $crate::envelope::Params::new();
        $(map.insert($key.to_string(), $crate::envelope::ParamValue::from($value));)*
        map
    }};
}

/// Pre-signature payload: `request` path, `nonce`, and caller parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    request: String,
    nonce: u64,
    params: Params,
}

impl RequestEnvelope {
    /// Caller values for the reserved `request` and `nonce` keys are dropped.
    pub fn build(request: impl Into<String>, nonce: u64, params: Option<Params>) -> Result<Self> {
        let request = request.into();
        let mut merged = Params::new();

        for (key, value) in params.unwrap_or_default() {
            if key == REQUEST_KEY || key == NONCE_KEY {
                warn!(key = %key, request = %request, "ignoring reserved request parameter");
                continue;
            }
            if let ParamValue::Float(number) = value {
                if !number.is_finite() {
                    return Err(GeminiError::InvalidParam(key));
                }
            }
            merged.insert(key, value);
        }

        Ok(Self {
            request,
            nonce,
            params: merged,
        })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for RequestEnvelope {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.params.len() + 2))?;
        map.serialize_entry(REQUEST_KEY, &self.request)?;
        map.serialize_entry(NONCE_KEY, &self.nonce)?;
        for (key, value) in &self.params {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Nanosecond nonces that never repeat or go backwards for one credential.
#[derive(Debug, Default)]
pub struct NonceGenerator {
    last: AtomicU64,
}

impl NonceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        let now = now_nanos();
        let prev = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or_else(|prev| prev);
        now.max(prev + 1)
    }
}

fn now_nanos() -> u64 {
    Utc::now()
        .timestamp_nanos_opt()
        .and_then(|nanos| u64::try_from(nanos).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn reserved_keys_keep_builder_values() {
        let params = params! {
            "request" => "/v1/evil",
            "nonce" => 1_i64,
            "symbol" => "btcusd",
        };
        let envelope = RequestEnvelope::build("/v1/order/status", 42, Some(params)).unwrap();

        let value: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"request": "/v1/order/status", "nonce": 42, "symbol": "btcusd"})
        );
    }

    #[test]
    fn primitives_serialize_as_json_primitives() {
        let params = params! {
            "order_id" => 107_421_210_i64,
            "amount" => 0.5,
            "flag" => true,
        };
        let envelope = RequestEnvelope::build("/v1/order/cancel", 7, Some(params)).unwrap();
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["order_id"], json!(107_421_210));
        assert_eq!(value["amount"], json!(0.5));
        assert_eq!(value["flag"], json!(true));
    }

    #[test]
    fn non_finite_float_is_rejected_before_signing() {
        let params = params! { "price" => f64::NAN };
        let err = RequestEnvelope::build("/v1/order/new", 1, Some(params)).unwrap_err();
        assert!(matches!(err, GeminiError::InvalidParam(key) if key == "price"));
    }

    #[test]
    fn envelope_without_params_has_only_reserved_fields() {
        let envelope = RequestEnvelope::build("/v1/balances", 9, None).unwrap();
        assert!(envelope.params().is_empty());
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value, json!({"request": "/v1/balances", "nonce": 9}));
    }

    #[test]
    fn sequential_nonces_strictly_increase() {
        let generator = NonceGenerator::new();
        let nonces: Vec<u64> = (0..1_000).map(|_| generator.next()).collect();
        assert!(nonces.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn concurrent_nonces_never_repeat() {
        let generator = Arc::new(NonceGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || (0..500).map(|_| generator.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut all = Vec::new();
        for handle in handles {
            let nonces = handle.join().unwrap();
            assert!(nonces.windows(2).all(|pair| pair[0] < pair[1]));
            all.extend(nonces);
        }
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), total);
    }
}
