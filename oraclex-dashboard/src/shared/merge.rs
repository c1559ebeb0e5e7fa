//! Market + analysis reconciliation
//!
//! Pure function of its two inputs: walks the catalogue in order, locates the
//! quote by symbol in the market list and the analysis by symbol key in the
//! analysis map, and applies analysis fields over quote fields.

use std::collections::HashMap;

use oraclex_relay::{
    model::symbol_key, AnalysisMap, AnalysisRecord, Instrument, MarketQuote, RawLevel,
};

use super::view::{
    Bias, BiasStability, LiquidityLevel, LiquidityLevels, Regime, SessionInfo, StateStatistics,
    Structure, Trend, ViewModel, ViewRecord, Volatility, NO_GRADE, UNKNOWN,
};

/// Merge one cycle's payloads into a complete view model.
pub fn merge(quotes: &[MarketQuote], analyses: &AnalysisMap) -> ViewModel {
    // First quote wins when the relay repeats a symbol
    let mut quote_index: HashMap<Instrument, &MarketQuote> = HashMap::new();
    for quote in quotes {
        if let Some(instrument) = Instrument::from_symbol(&quote.symbol) {
            quote_index.entry(instrument).or_insert(quote);
        }
    }

    ViewModel::from_records(Instrument::ALL.into_iter().map(|instrument| {
        merge_record(
            instrument,
            quote_index.get(&instrument).copied(),
            find_analysis(analyses, instrument),
        )
    }))
}

fn find_analysis(analyses: &AnalysisMap, instrument: Instrument) -> Option<&AnalysisRecord> {
    analyses.get(instrument.symbol()).or_else(|| {
        analyses
            .iter()
            .find(|(symbol, _)| symbol_key(symbol) == instrument.symbol())
            .map(|(_, record)| record)
    })
}

/// Quote fields first, then analysis fields as overrides.
pub fn merge_record(
    instrument: Instrument,
    quote: Option<&MarketQuote>,
    analysis: Option<&AnalysisRecord>,
) -> ViewRecord {
    let mut record = ViewRecord::empty(instrument);

    if let Some(quote) = quote {
        record.has_market = true;
        record.price = quote.price.unwrap_or(0.0);
        record.bid = quote.bid.unwrap_or(0.0);
        record.ask = quote.ask.unwrap_or(0.0);
        record.spread_points = quote.spread_points.unwrap_or(0.0);
        record.spread_percent = quote.spread_percent.unwrap_or(0.0);
        record.change = quote.change.unwrap_or(0.0);
        record.change_percent = quote.change_percent.unwrap_or(0.0);
        record.timeframes = quote.timeframes;
    }

    let Some(analysis) = analysis else {
        return record;
    };
    record.has_analysis = true;

    // Overlapping keys: analysis wins when it defines them
    if let Some(price) = analysis.price {
        record.price = price;
    }
    if let Some(bid) = analysis.bid {
        record.bid = bid;
    }
    if let Some(ask) = analysis.ask {
        record.ask = ask;
    }
    if let Some(spread) = analysis.spread_points {
        record.spread_points = spread;
    }

    record.confluence = analysis.confluence.unwrap_or(0.0);
    record.confluence_breakdown = analysis.confluence_weights_percent();
    record.confidence = analysis.confidence.unwrap_or(0.0);
    record.bias = Bias::parse(analysis.bias.as_deref());

    if let Some(regime) = &analysis.regime {
        record.regime = Regime {
            trend: Trend::parse(regime.trend.as_deref()),
            volatility: Volatility::parse(regime.volatility.as_deref()),
            structure: Structure::parse(regime.structure.as_deref()),
        };
    }

    record.timeframe_bias = analysis
        .timeframe_bias_labels()
        .into_iter()
        .map(|(timeframe, label)| (timeframe, Bias::parse(Some(&label))))
        .collect();

    if let Some(liquidity) = &analysis.liquidity {
        record.liquidity = LiquidityLevels {
            support: ordered_levels(&liquidity.support, true),
            resistance: ordered_levels(&liquidity.resistance, false),
        };
    }

    if let Some(stability) = &analysis.bias_stability {
        record.stability = BiasStability {
            active_minutes: stability.active_minutes.unwrap_or(0.0),
            minutes_since_flip: stability.minutes_since_flip.unwrap_or(0.0),
        };
    }

    if let Some(stats) = &analysis.state_stats {
        record.state_stats = StateStatistics {
            continuation: stats.continuation.unwrap_or(0.0),
            reversal: stats.reversal.unwrap_or(0.0),
            consolidation: stats.consolidation.unwrap_or(0.0),
        };
    }

    if let Some(session) = &analysis.session {
        record.session = SessionInfo {
            name: session.name.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            hours: session.hours.clone().unwrap_or_default(),
            typical_volatility: session
                .typical_volatility
                .clone()
                .unwrap_or_else(|| UNKNOWN.to_string()),
        };
    }

    record.risk = analysis.risk.unwrap_or(0.0);
    record.opportunity_grade = analysis
        .opportunity_grade
        .clone()
        .unwrap_or_else(|| NO_GRADE.to_string());
    record.interpretation = analysis.interpretation.clone().unwrap_or_default();

    record
}

/// Drop priceless levels; support descending, resistance ascending
fn ordered_levels(levels: &[RawLevel], descending: bool) -> Vec<LiquidityLevel> {
    let mut ordered: Vec<LiquidityLevel> = levels
        .iter()
        .filter_map(|level| {
            Some(LiquidityLevel {
                price: level.price?,
                strength: level.strength.unwrap_or(0.0),
            })
        })
        .collect();

    if descending {
        ordered.sort_by(|a, b| b.price.total_cmp(&a.price));
    } else {
        ordered.sort_by(|a, b| a.price.total_cmp(&b.price));
    }
    ordered
}
