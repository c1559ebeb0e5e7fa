/// OracleX Relay - catalogue, wire model and client
///
/// The relay is an external service owning the market-state and analysis
/// endpoints. This crate provides:
/// - The static instrument catalogue shared by every consumer
/// - Lenient JSON models for market quotes and per-instrument analysis
/// - A [`RelaySource`] seam and its `reqwest` implementation, [`RelayClient`]
pub mod client;
pub mod config;
pub mod de;
pub mod error;
pub mod instrument;
pub mod model;

pub use client::{RelayClient, RelaySource};
pub use config::RelayConfig;
pub use error::RelayError;
pub use instrument::{Category, Instrument};
pub use model::{
    analysis::{
        AnalysisMap, AnalysisRecord, RawBiasStability, RawLevel, RawLiquidity, RawRegime,
        RawSession, RawStateStats,
    },
    market::{MarketQuote, MarketState},
};
