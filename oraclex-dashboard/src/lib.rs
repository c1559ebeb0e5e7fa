/// OracleX Dashboard - Shared Library
///
/// Client-side core of the market dashboard:
/// - Fetch coordinator polling the relay on a fixed interval
/// - View model merger reconciling market quotes with per-instrument analysis
/// - Presentation derivation (precision, score bands, trader read, tab panels)
///
/// Rendering is left to the consumer; `oraclex-monitor` is a headless one.
pub mod shared;

pub use shared::config::{Acquisition, DashboardConfig, FailurePolicy};
pub use shared::coordinator::{
    shutdown_channel, spawn, CoordinatorHandle, CycleOutcome, FetchCoordinator,
};
pub use shared::debug_log::{DebugLog, LogEntry, Marker};
pub use shared::merge::{merge, merge_record};
pub use shared::narrative::trader_read;
pub use shared::presentation::{
    derive_panel, format_change, format_minutes, format_price, format_spread, BandThresholds,
    Palette, Panel, Rgb, Row, ScoreBand, ScoreKind, ScoreView, Tab, Theme,
};
pub use shared::state::{AppState, CycleReport, Dashboard, DashboardSnapshot};
pub use shared::view::{
    Bias, BiasStability, LiquidityLevel, LiquidityLevels, Regime, SessionInfo, Source,
    StateStatistics, Structure, Trend, ViewModel, ViewRecord, Volatility,
};
