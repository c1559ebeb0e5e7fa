/// Dashboard configuration
///
/// Builder-style, with `from_env()` falling back to defaults for anything
/// absent or unparsable.
use std::{str::FromStr, time::Duration};

use derive_more::Display;
use oraclex_relay::{config::env_string, Instrument, RelayConfig};
use tracing::warn;

use super::{debug_log::DEFAULT_CAPACITY, presentation::Theme};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// How analysis data is retrieved each cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum Acquisition {
    /// One `GET /analysis/{symbol}` per catalogue instrument, concurrently
    #[display("per_symbol")]
    PerSymbol,
    /// A single `GET /latest-analysis`
    #[display("batched")]
    Batched,
    /// Analysis fields carried inside the market-state payload
    #[default]
    #[display("embedded")]
    Embedded,
}

impl FromStr for Acquisition {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "per_symbol" | "symbol" => Ok(Acquisition::PerSymbol),
            "batched" | "batch" | "latest" => Ok(Acquisition::Batched),
            "embedded" | "relay" => Ok(Acquisition::Embedded),
            other => Err(format!("unknown acquisition strategy: {other}")),
        }
    }
}

/// What a cycle publishes for a source that failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum FailurePolicy {
    /// Keep the last good payload of that source and flag its records stale
    #[default]
    #[display("retain")]
    Retain,
    /// Replace that source's data with defaults
    #[display("blank")]
    Blank,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "retain" | "stale" => Ok(FailurePolicy::Retain),
            "blank" | "reset" => Ok(FailurePolicy::Blank),
            other => Err(format!("unknown failure policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub relay: RelayConfig,
    pub refresh_interval: Duration,
    pub acquisition: Acquisition,
    pub failure_policy: FailurePolicy,
    pub debug_log_size: usize,
    pub initial_symbol: Instrument,
    pub theme: Theme,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            relay: RelayConfig::default(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            acquisition: Acquisition::default(),
            failure_policy: FailurePolicy::default(),
            debug_log_size: DEFAULT_CAPACITY,
            initial_symbol: Instrument::Xauusd,
            theme: Theme::default(),
        }
    }
}

impl DashboardConfig {
    pub fn new(relay: RelayConfig) -> Self {
        Self {
            relay,
            ..Default::default()
        }
    }

    /// Clamped to [`MIN_REFRESH_INTERVAL`]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval.max(MIN_REFRESH_INTERVAL);
        self
    }

    /// Refresh interval with the clamp applied, also for configs built field by field
    pub fn effective_refresh_interval(&self) -> Duration {
        self.refresh_interval.max(MIN_REFRESH_INTERVAL)
    }

    pub fn with_acquisition(mut self, acquisition: Acquisition) -> Self {
        self.acquisition = acquisition;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_debug_log_size(mut self, size: usize) -> Self {
        self.debug_log_size = size.max(1);
        self
    }

    pub fn with_initial_symbol(mut self, instrument: Instrument) -> Self {
        self.initial_symbol = instrument;
        self
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    /// `RELAY_*` plus `REFRESH_SECS`, `ACQUISITION`, `ON_SOURCE_FAILURE`,
    /// `DEBUG_LOG_SIZE` and `SYMBOL`
    pub fn from_env() -> Self {
        let mut config = Self::new(RelayConfig::from_env());

        if let Some(secs) = env_parse::<u64>("REFRESH_SECS") {
            config = config.with_refresh_interval(Duration::from_secs(secs));
        }
        if let Some(acquisition) = env_parse::<Acquisition>("ACQUISITION") {
            config.acquisition = acquisition;
        }
        if let Some(policy) = env_parse::<FailurePolicy>("ON_SOURCE_FAILURE") {
            config.failure_policy = policy;
        }
        if let Some(size) = env_parse::<usize>("DEBUG_LOG_SIZE") {
            config = config.with_debug_log_size(size);
        }
        if let Some(symbol) = env_string("SYMBOL") {
            match Instrument::from_symbol(&symbol) {
                Some(instrument) => config.initial_symbol = instrument,
                None => warn!(%symbol, "SYMBOL is not in the catalogue, keeping default"),
            }
        }

        config
    }
}

fn env_parse<T>(key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env_string(key)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(key, value = %raw, %error, "ignoring invalid environment value");
            None
        }
    }
}
