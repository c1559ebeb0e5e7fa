//! Presentation derivation
//!
//! Pure functions of a [`ViewRecord`] and the UI selection: formatted numbers,
//! qualitative score bands with theme colours, and the per-tab [`Panel`].

use derive_more::Display;
use oraclex_relay::Instrument;
use serde::{Serialize, Serializer};

use super::{
    narrative::trader_read,
    view::{Bias, LiquidityLevel, ViewRecord},
};

pub const PLACEHOLDER: &str = "--";
pub const WAITING_MESSAGE: &str = "Waiting for data...";

/// 24-bit colour, rendered as `#rrggbb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("#{:02x}{:02x}{:02x}", _0, _1, _2)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Price with the instrument's fixed precision; no price renders as a placeholder
pub fn format_price(instrument: Instrument, price: f64) -> String {
    if !price.is_finite() || price == 0.0 {
        return PLACEHOLDER.to_string();
    }
    format!("{:.*}", usize::from(instrument.decimal_places()), price)
}

/// Spread in points, or in percent when the relay only reports a percent spread
pub fn format_spread(spread_points: f64, spread_percent: f64) -> String {
    let usable = |value: f64| value.is_finite() && value != 0.0;
    if !usable(spread_points) && usable(spread_percent) {
        return format!("{:.3}%", spread_percent);
    }
    if !spread_points.is_finite() {
        return PLACEHOLDER.to_string();
    }
    format!("{:.1} pts", spread_points)
}

/// Signed absolute change followed by the signed percent change
pub fn format_change(instrument: Instrument, change: f64, change_percent: f64) -> String {
    let arrow = if change > 0.0 {
        "▲"
    } else if change < 0.0 {
        "▼"
    } else {
        "→"
    };
    format!(
        "{} {:+.*} ({:+.2}%)",
        arrow,
        usize::from(instrument.decimal_places()),
        change,
        change_percent
    )
}

/// Compact duration: `45m`, `2h 05m`, `3d 4h`
pub fn format_minutes(minutes: f64) -> String {
    if !minutes.is_finite() || minutes <= 0.0 {
        return "0m".to_string();
    }

    let total = minutes.round() as u64;
    let (days, hours, mins) = (total / 1440, (total % 1440) / 60, total % 60);
    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {:02}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Qualitative band of a 0-100 score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
pub enum ScoreBand {
    #[display("VERY STRONG")]
    VeryStrong,
    #[display("STRONG")]
    Strong,
    #[display("MODERATE")]
    Moderate,
    #[display("WEAK")]
    Weak,
    #[display("NO DATA")]
    NoData,
}

/// Which score is being banded; risk reads "high is bad"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScoreKind {
    Confluence,
    Confidence,
    Risk,
}

impl ScoreKind {
    pub fn label(&self) -> &'static str {
        match self {
            ScoreKind::Confluence => "Confluence",
            ScoreKind::Confidence => "Confidence",
            ScoreKind::Risk => "Risk",
        }
    }
}

/// Lower bounds (inclusive) checked from highest to lowest
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandThresholds {
    pub very_strong: f64,
    pub strong: f64,
    pub moderate: f64,
}

impl Default for BandThresholds {
    fn default() -> Self {
        Self {
            very_strong: 75.0,
            strong: 60.0,
            moderate: 45.0,
        }
    }
}

impl BandThresholds {
    /// Absent, zero or non-finite scores are [`ScoreBand::NoData`], never [`ScoreBand::Weak`]
    pub fn band(&self, score: Option<f64>) -> ScoreBand {
        match score {
            Some(score) if score.is_finite() && score > 0.0 => {
                if score >= self.very_strong {
                    ScoreBand::VeryStrong
                } else if score >= self.strong {
                    ScoreBand::Strong
                } else if score >= self.moderate {
                    ScoreBand::Moderate
                } else {
                    ScoreBand::Weak
                }
            }
            _ => ScoreBand::NoData,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub very_strong: Rgb,
    pub strong: Rgb,
    pub moderate: Rgb,
    pub weak: Rgb,
    pub no_data: Rgb,
    pub bullish: Rgb,
    pub bearish: Rgb,
    pub neutral: Rgb,
    pub text: Rgb,
    pub dim: Rgb,
    pub accent: Rgb,
    pub warning: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            very_strong: Rgb(0x00, 0xff, 0x88),
            strong: Rgb(100, 220, 100),
            moderate: Rgb(0xff, 0xaa, 0x00),
            weak: Rgb(220, 100, 100),
            no_data: Rgb(0x88, 0x88, 0x88),
            bullish: Rgb(100, 220, 100),
            bearish: Rgb(220, 100, 100),
            neutral: Rgb(180, 180, 100),
            text: Rgb(220, 220, 220),
            dim: Rgb(120, 120, 120),
            accent: Rgb(100, 180, 220),
            warning: Rgb(0xff, 0xaa, 0x00),
        }
    }
}

/// Band thresholds plus colours: one configurable presentation for every layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Theme {
    pub thresholds: BandThresholds,
    pub palette: Palette,
}

/// Score ready for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreView {
    pub kind: ScoreKind,
    pub value: String,
    pub band: ScoreBand,
    pub label: &'static str,
    pub color: Rgb,
}

impl Theme {
    pub fn new(thresholds: BandThresholds, palette: Palette) -> Self {
        Self {
            thresholds,
            palette,
        }
    }

    pub fn with_thresholds(mut self, thresholds: BandThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    pub fn band(&self, score: f64) -> ScoreBand {
        self.thresholds.band(Some(score))
    }

    pub fn band_color(&self, kind: ScoreKind, band: ScoreBand) -> Rgb {
        let palette = &self.palette;
        match (kind, band) {
            (_, ScoreBand::NoData) => palette.no_data,
            (ScoreKind::Risk, ScoreBand::VeryStrong) => palette.weak,
            (ScoreKind::Risk, ScoreBand::Strong) => palette.moderate,
            (ScoreKind::Risk, ScoreBand::Moderate) => palette.strong,
            (ScoreKind::Risk, ScoreBand::Weak) => palette.very_strong,
            (_, ScoreBand::VeryStrong) => palette.very_strong,
            (_, ScoreBand::Strong) => palette.strong,
            (_, ScoreBand::Moderate) => palette.moderate,
            (_, ScoreBand::Weak) => palette.weak,
        }
    }

    pub fn band_label(&self, kind: ScoreKind, band: ScoreBand) -> &'static str {
        match (kind, band) {
            (_, ScoreBand::NoData) => "NO DATA",
            (ScoreKind::Risk, ScoreBand::VeryStrong) => "HIGH",
            (ScoreKind::Risk, ScoreBand::Strong) => "ELEVATED",
            (ScoreKind::Risk, ScoreBand::Moderate) => "MODERATE",
            (ScoreKind::Risk, ScoreBand::Weak) => "LOW",
            (_, ScoreBand::VeryStrong) => "VERY STRONG",
            (_, ScoreBand::Strong) => "STRONG",
            (_, ScoreBand::Moderate) => "MODERATE",
            (_, ScoreBand::Weak) => "WEAK",
        }
    }

    pub fn score(&self, kind: ScoreKind, score: f64) -> ScoreView {
        let band = self.band(score);
        ScoreView {
            kind,
            value: match band {
                ScoreBand::NoData => PLACEHOLDER.to_string(),
                _ => format!("{:.0}", score),
            },
            band,
            label: self.band_label(kind, band),
            color: self.band_color(kind, band),
        }
    }

    pub fn bias_color(&self, bias: Bias) -> Rgb {
        match bias {
            Bias::Bullish => self.palette.bullish,
            Bias::Bearish => self.palette.bearish,
            Bias::Neutral => self.palette.neutral,
        }
    }
}

/// Mutually exclusive detail tabs, one active at a time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, Serialize)]
pub enum Tab {
    #[default]
    Overview,
    Timeframes,
    Liquidity,
    Stability,
    Statistics,
    Session,
}

impl Tab {
    pub const ALL: [Tab; 6] = [
        Tab::Overview,
        Tab::Timeframes,
        Tab::Liquidity,
        Tab::Stability,
        Tab::Statistics,
        Tab::Session,
    ];

    fn position(&self) -> usize {
        Tab::ALL
            .iter()
            .position(|tab| tab == self)
            .unwrap_or_default()
    }

    /// Wraps around after the last tab
    pub fn next(&self) -> Tab {
        Tab::ALL[(self.position() + 1) % Tab::ALL.len()]
    }

    pub fn previous(&self) -> Tab {
        Tab::ALL[(self.position() + Tab::ALL.len() - 1) % Tab::ALL.len()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub label: String,
    pub value: String,
    pub color: Rgb,
}

impl Row {
    fn new(label: impl Into<String>, value: impl Into<String>, color: Rgb) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            color,
        }
    }
}

/// Derived content of one tab for one instrument
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Panel {
    /// Neither source has supplied data for the instrument
    Waiting {
        symbol: &'static str,
        message: &'static str,
    },
    Ready {
        symbol: &'static str,
        category: &'static str,
        tab: Tab,
        price: String,
        bias: Bias,
        bias_color: Rgb,
        stale: bool,
        rows: Vec<Row>,
    },
}

impl Panel {
    pub fn rows(&self) -> &[Row] {
        match self {
            Panel::Waiting { .. } => &[],
            Panel::Ready { rows, .. } => rows,
        }
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, Panel::Waiting { .. })
    }
}

pub fn derive_panel(record: &ViewRecord, tab: Tab, theme: &Theme) -> Panel {
    if record.is_waiting() {
        return Panel::Waiting {
            symbol: record.symbol(),
            message: WAITING_MESSAGE,
        };
    }

    let rows = match tab {
        Tab::Overview => overview_rows(record, theme),
        Tab::Timeframes => timeframe_rows(record, theme),
        Tab::Liquidity => liquidity_rows(record, theme),
        Tab::Stability => stability_rows(record, theme),
        Tab::Statistics => statistics_rows(record, theme),
        Tab::Session => session_rows(record, theme),
    };

    Panel::Ready {
        symbol: record.symbol(),
        category: record.instrument.category().label(),
        tab,
        price: format_price(record.instrument, record.price),
        bias: record.bias,
        bias_color: theme.bias_color(record.bias),
        stale: record.is_stale(),
        rows,
    }
}

fn score_row(theme: &Theme, kind: ScoreKind, score: f64) -> Row {
    let view = theme.score(kind, score);
    Row::new(kind.label(), format!("{} {}", view.value, view.label), view.color)
}

fn overview_rows(record: &ViewRecord, theme: &Theme) -> Vec<Row> {
    let palette = &theme.palette;
    let instrument = record.instrument;

    let mut rows = vec![
        Row::new("Price", format_price(instrument, record.price), palette.text),
        Row::new(
            "Bid / Ask",
            format!(
                "{} / {}",
                format_price(instrument, record.bid),
                format_price(instrument, record.ask)
            ),
            palette.dim,
        ),
        Row::new(
            "Spread",
            format_spread(record.spread_points, record.spread_percent),
            palette.dim,
        ),
        Row::new(
            "Change",
            format_change(instrument, record.change, record.change_percent),
            if record.change > 0.0 {
                palette.bullish
            } else if record.change < 0.0 {
                palette.bearish
            } else {
                palette.dim
            },
        ),
        Row::new(
            "Bias",
            format!("{} {}", record.bias.arrow(), record.bias.label()),
            theme.bias_color(record.bias),
        ),
        score_row(theme, ScoreKind::Confluence, record.confluence),
        score_row(theme, ScoreKind::Confidence, record.confidence),
        score_row(theme, ScoreKind::Risk, record.risk),
        Row::new("Grade", record.opportunity_grade.clone(), palette.accent),
        Row::new(
            "Regime",
            format!(
                "{} / {} / {}",
                record.regime.trend, record.regime.volatility, record.regime.structure
            ),
            palette.text,
        ),
        Row::new("Trader read", trader_read(&record.regime), palette.accent),
        Row::new("Timeframes", record.timeframes.to_string(), palette.dim),
    ];

    if !record.interpretation.is_empty() {
        rows.push(Row::new(
            "Interpretation",
            record.interpretation.clone(),
            palette.text,
        ));
    }
    rows
}

fn timeframe_rows(record: &ViewRecord, theme: &Theme) -> Vec<Row> {
    let palette = &theme.palette;
    let mut rows: Vec<Row> = record
        .timeframe_bias
        .iter()
        .map(|(timeframe, bias)| {
            Row::new(
                timeframe.clone(),
                format!("{} {}", bias.arrow(), bias.label()),
                theme.bias_color(*bias),
            )
        })
        .collect();

    if rows.is_empty() {
        rows.push(Row::new("Timeframes", "No timeframe data", palette.dim));
    }

    rows.extend(record.confluence_breakdown.iter().map(|(factor, weight)| {
        Row::new(factor.clone(), format_percent(*weight), palette.accent)
    }));
    rows
}

fn level_rows(
    prefix: &str,
    levels: &[LiquidityLevel],
    record: &ViewRecord,
    theme: &Theme,
    color: Rgb,
) -> Vec<Row> {
    levels
        .iter()
        .enumerate()
        .map(|(index, level)| {
            let strength = theme.score(ScoreKind::Confluence, level.strength);
            Row::new(
                format!("{}{}", prefix, index + 1),
                format!(
                    "{} (strength {})",
                    format_price(record.instrument, level.price),
                    strength.value
                ),
                color,
            )
        })
        .collect()
}

fn liquidity_rows(record: &ViewRecord, theme: &Theme) -> Vec<Row> {
    let palette = &theme.palette;
    let liquidity = &record.liquidity;

    // Furthest resistance first so the column reads top-down in price
    let resistance: Vec<LiquidityLevel> = liquidity.resistance.iter().rev().copied().collect();
    let mut rows = level_rows("R", &resistance, record, theme, palette.bearish);
    let count = rows.len();
    for (offset, row) in rows.iter_mut().enumerate() {
        row.label = format!("R{}", count - offset);
    }

    rows.push(Row::new(
        "Price",
        format_price(record.instrument, record.price),
        palette.text,
    ));
    rows.extend(level_rows("S", &liquidity.support, record, theme, palette.bullish));

    if liquidity.support.is_empty() && liquidity.resistance.is_empty() {
        rows.push(Row::new("Liquidity", "No levels reported", palette.dim));
    }
    rows
}

fn stability_rows(record: &ViewRecord, theme: &Theme) -> Vec<Row> {
    let palette = &theme.palette;
    vec![
        Row::new(
            "Bias",
            format!("{} {}", record.bias.arrow(), record.bias.label()),
            theme.bias_color(record.bias),
        ),
        Row::new(
            "Active for",
            format_minutes(record.stability.active_minutes),
            palette.text,
        ),
        Row::new(
            "Since last flip",
            format_minutes(record.stability.minutes_since_flip),
            palette.text,
        ),
    ]
}

fn statistics_rows(record: &ViewRecord, theme: &Theme) -> Vec<Row> {
    let palette = &theme.palette;
    let stats = &record.state_stats;
    vec![
        Row::new("Continuation", format_percent(stats.continuation), palette.bullish),
        Row::new("Reversal", format_percent(stats.reversal), palette.bearish),
        Row::new("Consolidation", format_percent(stats.consolidation), palette.neutral),
    ]
}

fn session_rows(record: &ViewRecord, theme: &Theme) -> Vec<Row> {
    let palette = &theme.palette;
    let session = &record.session;
    vec![
        Row::new("Session", session.name.clone(), palette.accent),
        Row::new(
            "Hours",
            if session.hours.is_empty() {
                PLACEHOLDER.to_string()
            } else {
                session.hours.clone()
            },
            palette.text,
        ),
        Row::new(
            "Typical volatility",
            session.typical_volatility.clone(),
            palette.text,
        ),
    ]
}
