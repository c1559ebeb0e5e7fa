/// Relay payload models
///
/// `market` covers `GET /get-market-state`, `analysis` covers
/// `GET /analysis/{symbol}` and `GET /latest-analysis` (and analysis fields
/// embedded in market-state entries).
pub mod analysis;
pub mod market;

/// Upper-cased, trimmed symbol key used by every map in this crate
pub fn symbol_key(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
