use super::view::{Regime, Structure, Trend, Volatility};

pub const BREAKOUT: &str =
    "Strong trend with expanding volatility: breakout conditions, favour momentum entries.";
pub const PULLBACK: &str =
    "Strong trending structure: look for pullbacks to join the prevailing direction.";
pub const REVERSAL_CAUTION: &str =
    "Weak trend: momentum is fading, be cautious of reversals and tighten risk.";
pub const COMPRESSION: &str =
    "Volatility contracting: compression often precedes expansion, wait for confirmation.";
pub const RANGE: &str = "Range-bound structure: fade the extremes and respect support/resistance.";
pub const DEFAULT_READ: &str = "Mixed conditions: no clear edge, stay patient and selective.";

type Rule = (fn(&Regime) -> bool, &'static str);

fn breakout(regime: &Regime) -> bool {
    regime.trend == Trend::Strong && regime.volatility == Volatility::Expanding
}

fn pullback(regime: &Regime) -> bool {
    regime.trend == Trend::Strong && regime.structure == Structure::Trending
}

fn fading(regime: &Regime) -> bool {
    regime.trend == Trend::Weak
}

fn compressing(regime: &Regime) -> bool {
    regime.volatility == Volatility::Contracting
}

fn ranging(regime: &Regime) -> bool {
    matches!(regime.structure, Structure::Ranging | Structure::Choppy)
}

/// Evaluated top to bottom, first match wins
const RULES: [Rule; 5] = [
    (breakout, BREAKOUT),
    (pullback, PULLBACK),
    (fading, REVERSAL_CAUTION),
    (compressing, COMPRESSION),
    (ranging, RANGE),
];

/// Canned "trader read" sentence for a regime.
pub fn trader_read(regime: &Regime) -> &'static str {
    RULES
        .iter()
        .find(|(rule, _)| rule(regime))
        .map(|(_, sentence)| *sentence)
        .unwrap_or(DEFAULT_READ)
}
