use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::{market::json_kind, symbol_key};
use crate::{de, error::RelayError};

/// Analysis records keyed by upper-cased symbol
pub type AnalysisMap = HashMap<String, AnalysisRecord>;

/// Per-instrument analytics from the analysis endpoints.
///
/// Every field is independently optional. Quote fields (`price`, `bid`, ...)
/// are present when the analysis service re-publishes the price it analysed;
/// they override the market-state quote during the merge.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnalysisRecord {
    #[serde(default, deserialize_with = "de::string_opt")]
    pub symbol: Option<String>,

    #[serde(default, deserialize_with = "de::f64_opt")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "de::f64_opt")]
    pub bid: Option<f64>,
    #[serde(default, deserialize_with = "de::f64_opt")]
    pub ask: Option<f64>,
    #[serde(default, deserialize_with = "de::f64_opt")]
    pub spread_points: Option<f64>,

    #[serde(default, deserialize_with = "de::f64_opt")]
    pub confluence: Option<f64>,
    #[serde(default, deserialize_with = "de::nested_opt")]
    pub confluence_breakdown: Option<BTreeMap<String, Value>>,
    #[serde(default, deserialize_with = "de::f64_opt")]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "de::string_opt")]
    pub bias: Option<String>,
    #[serde(default, deserialize_with = "de::nested_opt")]
    pub regime: Option<RawRegime>,
    #[serde(default, deserialize_with = "de::nested_opt")]
    pub timeframe_bias: Option<BTreeMap<String, Value>>,
    #[serde(default, deserialize_with = "de::nested_opt")]
    pub liquidity: Option<RawLiquidity>,
    #[serde(default, deserialize_with = "de::nested_opt")]
    pub bias_stability: Option<RawBiasStability>,
    #[serde(default, deserialize_with = "de::nested_opt")]
    pub state_stats: Option<RawStateStats>,
    #[serde(default, deserialize_with = "de::nested_opt")]
    pub session: Option<RawSession>,
    #[serde(default, deserialize_with = "de::f64_opt")]
    pub risk: Option<f64>,
    #[serde(default, deserialize_with = "de::string_opt")]
    pub opportunity_grade: Option<String>,
    #[serde(default, deserialize_with = "de::string_opt")]
    pub interpretation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRegime {
    #[serde(default, deserialize_with = "de::string_opt")]
    pub trend: Option<String>,
    #[serde(default, deserialize_with = "de::string_opt")]
    pub volatility: Option<String>,
    #[serde(default, deserialize_with = "de::string_opt")]
    pub structure: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawLiquidity {
    #[serde(default, deserialize_with = "levels")]
    pub support: Vec<RawLevel>,
    #[serde(default, deserialize_with = "levels")]
    pub resistance: Vec<RawLevel>,
}

/// Liquidity level, sent either as `{price, strength}` or `[price, strength]`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawLevel {
    pub price: Option<f64>,
    pub strength: Option<f64>,
}

impl RawLevel {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) => Self {
                price: items.first().and_then(de::value_as_f64),
                strength: items.get(1).and_then(de::value_as_f64),
            },
            Value::Object(map) => Self {
                price: map
                    .get("price")
                    .or_else(|| map.get("level"))
                    .and_then(de::value_as_f64),
                strength: map
                    .get("strength")
                    .or_else(|| map.get("score"))
                    .and_then(de::value_as_f64),
            },
            other => Self {
                price: de::value_as_f64(other),
                strength: None,
            },
        }
    }
}

fn levels<'de, D>(deserializer: D) -> Result<Vec<RawLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.iter().map(RawLevel::from_value).collect(),
        _ => Vec::new(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawBiasStability {
    #[serde(default, deserialize_with = "de::f64_opt")]
    pub active_minutes: Option<f64>,
    #[serde(default, deserialize_with = "de::f64_opt")]
    pub minutes_since_flip: Option<f64>,
}

/// Historical outcome percentages for the current state; not required to sum to 100
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawStateStats {
    #[serde(default, deserialize_with = "de::f64_opt")]
    pub continuation: Option<f64>,
    #[serde(default, deserialize_with = "de::f64_opt")]
    pub reversal: Option<f64>,
    #[serde(default, deserialize_with = "de::f64_opt")]
    pub consolidation: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawSession {
    #[serde(default, deserialize_with = "de::string_opt")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::string_opt")]
    pub hours: Option<String>,
    #[serde(default, deserialize_with = "de::string_opt")]
    pub typical_volatility: Option<String>,
}

const RECORD_ALIASES: de::Aliases = &[
    ("price", &["current_price"]),
    ("confluence", &["confluence_score"]),
    ("confidence", &["confidence_score"]),
    ("bias", &["directional_bias"]),
    ("regime", &["market_regime"]),
    ("timeframe_bias", &["mtf_bias"]),
    ("liquidity", &["liquidity_levels"]),
    ("state_stats", &["historical_stats"]),
    ("session", &["session_info"]),
    ("risk", &["risk_score"]),
    ("opportunity_grade", &["grade"]),
    ("interpretation", &["trader_interpretation"]),
];

const LIQUIDITY_ALIASES: de::Aliases = &[
    ("support", &["supports"]),
    ("resistance", &["resistances"]),
];

const STABILITY_ALIASES: de::Aliases = &[
    ("active_minutes", &["minutes_active", "bias_active_minutes"]),
    ("minutes_since_flip", &["minutes_since_last_flip", "last_flip_minutes"]),
];

const SESSION_ALIASES: de::Aliases = &[
    ("name", &["current", "current_session"]),
    ("hours", &["session_hours"]),
    ("typical_volatility", &["volatility"]),
];

impl AnalysisRecord {
    /// Parse a single analysis object; anything but an object yields `None`
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut object) = value else {
            return None;
        };
        de::resolve_aliases(&mut object, RECORD_ALIASES);
        de::resolve_nested_aliases(&mut object, "liquidity", LIQUIDITY_ALIASES);
        de::resolve_nested_aliases(&mut object, "bias_stability", STABILITY_ALIASES);
        de::resolve_nested_aliases(&mut object, "session", SESSION_ALIASES);

        serde_json::from_value(Value::Object(object)).ok()
    }

    /// True when any analytics field (as opposed to quote overrides) is present
    pub fn has_analytics(&self) -> bool {
        self.confluence.is_some()
            || self.confluence_breakdown.is_some()
            || self.confidence.is_some()
            || self.bias.is_some()
            || self.regime.is_some()
            || self.timeframe_bias.is_some()
            || self.liquidity.is_some()
            || self.bias_stability.is_some()
            || self.state_stats.is_some()
            || self.session.is_some()
            || self.risk.is_some()
            || self.opportunity_grade.is_some()
            || self.interpretation.is_some()
    }

    /// Analysis carried inside a market-state entry.
    ///
    /// A nested `analysis` object wins; otherwise top-level analytics fields
    /// of the entry are used. Entries with no analytics yield `None`.
    pub fn embedded_in(entry: &Value) -> Option<Self> {
        let object = entry.as_object()?;
        let symbol = object.get("symbol").and_then(de::value_as_string);

        let mut record = match object.get("analysis") {
            Some(nested @ Value::Object(_)) => AnalysisRecord::from_value(nested.clone())?,
            _ => {
                let record = AnalysisRecord::from_value(entry.clone())?;
                if !record.has_analytics() {
                    return None;
                }
                // Quote fields at the top level belong to the market side
                AnalysisRecord {
                    price: None,
                    bid: None,
                    ask: None,
                    spread_points: None,
                    ..record
                }
            }
        };

        if record.symbol.is_none() {
            record.symbol = symbol;
        }
        Some(record)
    }

    /// Timeframe label to bias string; accepts `"H1": "BULLISH"` and `"H1": {"bias": "BULLISH"}`
    pub fn timeframe_bias_labels(&self) -> BTreeMap<String, String> {
        self.timeframe_bias
            .iter()
            .flatten()
            .filter_map(|(timeframe, value)| {
                let label = match value {
                    Value::Object(map) => map.get("bias").and_then(de::value_as_string),
                    other => de::value_as_string(other),
                }?;
                Some((timeframe.trim().to_string(), label))
            })
            .collect()
    }

    /// Confluence factor weights in percent (0-100).
    ///
    /// Some relay builds publish weights as fractions of one; a breakdown
    /// whose weights all lie in `[0, 1]` and sum to at most 1 is scaled by 100.
    pub fn confluence_weights_percent(&self) -> BTreeMap<String, f64> {
        let weights: BTreeMap<String, f64> = self
            .confluence_breakdown
            .iter()
            .flatten()
            .filter_map(|(factor, value)| {
                let weight = match value {
                    Value::Object(map) => map
                        .get("weight")
                        .or_else(|| map.get("score"))
                        .and_then(de::value_as_f64),
                    other => de::value_as_f64(other),
                }?;
                Some((factor.trim().to_string(), weight))
            })
            .collect();

        let fractional = !weights.is_empty()
            && weights.values().all(|weight| (0.0..=1.0).contains(weight))
            && weights.values().sum::<f64>() <= 1.0 + 1e-9;

        if fractional {
            weights
                .into_iter()
                .map(|(factor, weight)| (factor, weight * 100.0))
                .collect()
        } else {
            weights
        }
    }
}

/// Parse a single-instrument analysis response (`GET /analysis/{symbol}`).
///
/// Accepts the bare record or a `{ "analysis": {...} }` envelope.
pub fn analysis_from_value(
    endpoint: &str,
    symbol: &str,
    payload: Value,
) -> Result<AnalysisRecord, RelayError> {
    let payload = match payload {
        Value::Object(mut map) if matches!(map.get("analysis"), Some(Value::Object(_))) => {
            map.remove("analysis").unwrap_or_default()
        }
        other => other,
    };

    let kind = json_kind(&payload);
    let mut record = AnalysisRecord::from_value(payload).ok_or_else(|| RelayError::Malformed {
        endpoint: endpoint.to_string(),
        reason: format!("analysis is {kind}, expected object"),
    })?;
    if record.symbol.is_none() {
        record.symbol = Some(symbol_key(symbol));
    }
    Ok(record)
}

/// Parse a batched analysis response (`GET /latest-analysis`).
///
/// Accepts `{ "analyses": [...] }`, a bare array, or an object keyed by
/// symbol. List entries without a symbol are skipped.
pub fn analyses_from_value(endpoint: &str, payload: Value) -> Result<AnalysisMap, RelayError> {
    let mut map = AnalysisMap::new();

    let entries = match payload {
        Value::Object(mut object) => match object.remove("analyses") {
            Some(Value::Array(entries)) => entries,
            Some(other) => {
                return Err(RelayError::Malformed {
                    endpoint: endpoint.to_string(),
                    reason: format!("analyses is {}, expected array", json_kind(&other)),
                })
            }
            None => {
                // Keyed by symbol
                for (symbol, value) in object {
                    if let Some(mut record) = AnalysisRecord::from_value(value) {
                        record.symbol.get_or_insert_with(|| symbol_key(&symbol));
                        map.insert(symbol_key(&symbol), record);
                    }
                }
                return Ok(map);
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

    for entry in entries {
        let Some(record) = AnalysisRecord::from_value(entry) else {
            continue;
        };
        if let Some(symbol) = record.symbol.as_deref() {
            map.insert(symbol_key(symbol), record);
        }
    }

    Ok(map)
}
