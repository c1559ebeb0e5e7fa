/// Unified per-instrument view model
///
/// A [`ViewModel`] holds exactly one [`ViewRecord`] per catalogue instrument.
/// Records are rebuilt from scratch every fetch cycle; absent data is
/// represented by documented defaults, never by `Option` leaking into the UI.
use std::collections::BTreeMap;

use derive_more::Display;
use indexmap::IndexMap;
use oraclex_relay::Instrument;
use serde::Serialize;

/// Directional call for an instrument
#[derive(Clone, Debug, Copy, Default, PartialEq, Eq, Hash, Display, Serialize)]
pub enum Bias {
    #[display("BULLISH")]
    Bullish,
    #[display("BEARISH")]
    Bearish,
    #[default]
    #[display("NEUTRAL")]
    Neutral,
}

impl Bias {
    /// Anything outside the closed set, including absence, is NEUTRAL
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|raw| raw.trim().to_ascii_uppercase()).as_deref() {
            Some("BULLISH") => Bias::Bullish,
            Some("BEARISH") => Bias::Bearish,
            _ => Bias::Neutral,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Bias::Bullish => "BULLISH",
            Bias::Bearish => "BEARISH",
            Bias::Neutral => "NEUTRAL",
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            Bias::Bullish => "▲",
            Bias::Bearish => "▼",
            Bias::Neutral => "→",
        }
    }
}

/// Trend strength label of the regime
#[derive(Clone, Debug, Copy, Default, PartialEq, Eq, Display, Serialize)]
pub enum Trend {
    Strong,
    Moderate,
    Weak,
    #[default]
    Unknown,
}

impl Trend {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|raw| raw.trim().to_ascii_lowercase()).as_deref() {
            Some("strong") => Trend::Strong,
            Some("moderate") | Some("medium") => Trend::Moderate,
            Some("weak") => Trend::Weak,
            _ => Trend::Unknown,
        }
    }
}

/// Volatility label of the regime
#[derive(Clone, Debug, Copy, Default, PartialEq, Eq, Display, Serialize)]
pub enum Volatility {
    Expanding,
    Contracting,
    Stable,
    #[default]
    Unknown,
}

impl Volatility {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|raw| raw.trim().to_ascii_lowercase()).as_deref() {
            Some("expanding") | Some("rising") => Volatility::Expanding,
            Some("contracting") | Some("compressing") => Volatility::Contracting,
            Some("stable") | Some("normal") => Volatility::Stable,
            _ => Volatility::Unknown,
        }
    }
}

/// Market structure label of the regime
#[derive(Clone, Debug, Copy, Default, PartialEq, Eq, Display, Serialize)]
pub enum Structure {
    Trending,
    Ranging,
    Choppy,
    #[default]
    Unknown,
}

impl Structure {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|raw| raw.trim().to_ascii_lowercase()).as_deref() {
            Some("trending") => Structure::Trending,
            Some("ranging") | Some("range") => Structure::Ranging,
            Some("choppy") => Structure::Choppy,
            _ => Structure::Unknown,
        }
    }
}

#[derive(Clone, Debug, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Regime {
    pub trend: Trend,
    pub volatility: Volatility,
    pub structure: Structure,
}

#[derive(Clone, Debug, Copy, Default, PartialEq, Serialize)]
pub struct LiquidityLevel {
    pub price: f64,
    pub strength: f64,
}

/// Support ordered nearest-first below price (descending), resistance ascending
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LiquidityLevels {
    pub support: Vec<LiquidityLevel>,
    pub resistance: Vec<LiquidityLevel>,
}

#[derive(Clone, Debug, Copy, Default, PartialEq, Serialize)]
pub struct BiasStability {
    pub active_minutes: f64,
    pub minutes_since_flip: f64,
}

/// Historical outcome percentages for the current state
#[derive(Clone, Debug, Copy, Default, PartialEq, Serialize)]
pub struct StateStatistics {
    pub continuation: f64,
    pub reversal: f64,
    pub consolidation: f64,
}

pub const UNKNOWN: &str = "Unknown";
pub const NO_GRADE: &str = "N/A";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionInfo {
    pub name: String,
    pub hours: String,
    pub typical_volatility: String,
}

impl Default for SessionInfo {
    fn default() -> Self {
        Self {
            name: UNKNOWN.to_string(),
            hours: String::new(),
            typical_volatility: UNKNOWN.to_string(),
        }
    }
}

/// Relay source a record's data came from
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum Source {
    Market,
    Analysis,
}

/// Merged per-instrument record consumed by rendering
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ViewRecord {
    pub instrument: Instrument,

    // Quote
    pub price: f64,
    pub bid: f64,
    pub ask: f64,
    pub spread_points: f64,
    pub spread_percent: f64,
    pub change: f64,
    pub change_percent: f64,
    pub timeframes: usize,

    // Analysis
    pub confluence: f64,
    pub confluence_breakdown: BTreeMap<String, f64>,
    pub confidence: f64,
    pub bias: Bias,
    pub regime: Regime,
    pub timeframe_bias: BTreeMap<String, Bias>,
    pub liquidity: LiquidityLevels,
    pub stability: BiasStability,
    pub state_stats: StateStatistics,
    pub session: SessionInfo,
    pub risk: f64,
    pub opportunity_grade: String,
    pub interpretation: String,

    // Provenance
    pub has_market: bool,
    pub has_analysis: bool,
    pub market_stale: bool,
    pub analysis_stale: bool,
}

impl ViewRecord {
    /// All-defaults record: the "waiting for data" state
    pub fn empty(instrument: Instrument) -> Self {
        Self {
            instrument,
            price: 0.0,
            bid: 0.0,
            ask: 0.0,
            spread_points: 0.0,
            spread_percent: 0.0,
            change: 0.0,
            change_percent: 0.0,
            timeframes: 0,
            confluence: 0.0,
            confluence_breakdown: BTreeMap::new(),
            confidence: 0.0,
            bias: Bias::Neutral,
            regime: Regime::default(),
            timeframe_bias: BTreeMap::new(),
            liquidity: LiquidityLevels::default(),
            stability: BiasStability::default(),
            state_stats: StateStatistics::default(),
            session: SessionInfo::default(),
            risk: 0.0,
            opportunity_grade: NO_GRADE.to_string(),
            interpretation: String::new(),
            has_market: false,
            has_analysis: false,
            market_stale: false,
            analysis_stale: false,
        }
    }

    pub fn symbol(&self) -> &'static str {
        self.instrument.symbol()
    }

    /// Neither source has ever supplied data for this instrument
    pub fn is_waiting(&self) -> bool {
        !self.has_market && !self.has_analysis
    }

    pub fn is_stale(&self) -> bool {
        self.market_stale || self.analysis_stale
    }
}

/// One record per catalogue instrument, in catalogue order
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ViewModel {
    records: IndexMap<Instrument, ViewRecord>,
}

impl Default for ViewModel {
    fn default() -> Self {
        Self::empty()
    }
}

impl ViewModel {
    /// Every instrument present with defaults
    pub fn empty() -> Self {
        Self {
            records: Instrument::ALL
                .into_iter()
                .map(|instrument| (instrument, ViewRecord::empty(instrument)))
                .collect(),
        }
    }

    /// Build from merged records; instruments missing from `records` get defaults
    pub(crate) fn from_records(records: impl IntoIterator<Item = ViewRecord>) -> Self {
        let mut model = Self::empty();
        for record in records {
            model.records.insert(record.instrument, record);
        }
        model
    }

    pub fn get(&self, instrument: Instrument) -> &ViewRecord {
        // Constructed from the full catalogue, the lookup cannot miss
        &self.records[&instrument]
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&ViewRecord> {
        Instrument::from_symbol(symbol).map(|instrument| self.get(instrument))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ViewRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Flag data from `source` as carried over from an earlier cycle
    pub fn mark_stale(&mut self, source: Source) {
        for record in self.records.values_mut() {
            match source {
                Source::Market if record.has_market => record.market_stale = true,
                Source::Analysis if record.has_analysis => record.analysis_stale = true,
                _ => {}
            }
        }
    }

    pub fn waiting_count(&self) -> usize {
        self.iter().filter(|record| record.is_waiting()).count()
    }
}

impl std::ops::Index<Instrument> for ViewModel {
    type Output = ViewRecord;

    fn index(&self, instrument: Instrument) -> &Self::Output {
        self.get(instrument)
    }
}
