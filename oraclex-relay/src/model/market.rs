use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{
    analysis::{AnalysisMap, AnalysisRecord},
    symbol_key,
};
use crate::{de, error::RelayError};

/// Raw per-instrument quote from `GET /get-market-state`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MarketQuote {
    pub symbol: String,
    #[serde(default, deserialize_with = "de::f64_opt")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "de::f64_opt")]
    pub bid: Option<f64>,
    #[serde(default, deserialize_with = "de::f64_opt")]
    pub ask: Option<f64>,
    #[serde(default, deserialize_with = "de::f64_opt")]
    pub spread_points: Option<f64>,
    #[serde(default, deserialize_with = "de::f64_opt")]
    pub spread_percent: Option<f64>,
    /// Price change over the relay's reporting interval
    #[serde(default, deserialize_with = "de::f64_opt")]
    pub change: Option<f64>,
    #[serde(default, deserialize_with = "de::f64_opt")]
    pub change_percent: Option<f64>,
    /// Number of timeframes the relay has candles for
    #[serde(default, deserialize_with = "de::array_len")]
    pub timeframes: usize,
}

const QUOTE_ALIASES: de::Aliases = &[
    ("price", &["last", "mid"]),
    ("spread_points", &["spread"]),
    ("spread_percent", &["spread_pct"]),
    ("change", &["price_change"]),
    ("change_percent", &["change_pct"]),
];

impl MarketQuote {
    /// Parse one market entry; `None` unless it is an object with a string `symbol`
    pub fn from_value(value: &Value) -> Option<Self> {
        let Value::Object(object) = value else {
            return None;
        };
        let mut object = object.clone();
        de::resolve_aliases(&mut object, QUOTE_ALIASES);

        serde_json::from_value::<MarketQuote>(Value::Object(object))
            .ok()
            .filter(|quote| !quote.symbol.trim().is_empty())
    }

    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }
}

/// Parsed `GET /get-market-state` payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketState {
    pub quotes: Vec<MarketQuote>,
    /// Analysis embedded in market entries, keyed by symbol
    pub embedded: AnalysisMap,
}

impl MarketState {
    /// Parse `{ "market_data": [...] }` (a bare array is accepted too).
    ///
    /// Entries that are not objects or lack a string `symbol` are skipped.
    pub fn from_value(endpoint: &str, payload: Value) -> Result<Self, RelayError> {
        let entries = match payload {
            Value::Object(mut map) => match map.remove("market_data") {
                Some(Value::Array(entries)) => entries,
                Some(other) => {
                    return Err(RelayError::Malformed {
                        endpoint: endpoint.to_string(),
                        reason: format!("market_data is {}, expected array", json_kind(&other)),
                    })
                }
                None => {
                    return Err(RelayError::Malformed {
                        endpoint: endpoint.to_string(),
                        reason: "missing market_data".to_string(),
                    })
                }
            },
            Value::Array(entries) => entries,
            other => {
                return Err(RelayError::Malformed {
                    endpoint: endpoint.to_string(),
                    reason: format!("payload is {}, expected object", json_kind(&other)),
                })
            }
        };

        let mut state = MarketState::default();
        for entry in entries {
            let Some(quote) = MarketQuote::from_value(&entry) else {
                debug!(%endpoint, "skipping market entry without symbol");
                continue;
            };

            if let Some(analysis) = AnalysisRecord::embedded_in(&entry) {
                state.embedded.insert(symbol_key(&quote.symbol), analysis);
            }
            state.quotes.push(quote);
        }

        Ok(state)
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
