//! Static instrument catalogue.
//!
//! The catalogue is fixed at compile time. Iteration order of [`Instrument::ALL`]
//! is the order every merge and every rendering pass walks.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Instrument class used for grouping and display precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Category {
    PreciousMetals,
    Cryptocurrency,
    ForexMajor,
    ForexPairs,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::PreciousMetals => "Precious Metals",
            Category::Cryptocurrency => "Cryptocurrency",
            Category::ForexMajor => "Forex Major",
            Category::ForexPairs => "Forex Pairs",
        }
    }

    /// Price precision for every instrument in this class
    pub fn decimal_places(&self) -> u8 {
        match self {
            Category::ForexMajor | Category::ForexPairs => 5,
            Category::PreciousMetals | Category::Cryptocurrency => 2,
        }
    }
}

/// Catalogue instrument, displayed as its relay symbol
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Instrument {
    #[display("XAUUSD")]
    Xauusd,
    #[display("XAGUSD")]
    Xagusd,
    #[display("BTCUSD")]
    Btcusd,
    #[display("ETHUSD")]
    Ethusd,
    #[display("EURUSD")]
    Eurusd,
    #[display("GBPUSD")]
    Gbpusd,
    #[display("USDJPY")]
    Usdjpy,
    #[display("GBPJPY")]
    Gbpjpy,
    #[display("EURJPY")]
    Eurjpy,
    #[display("AUDUSD")]
    Audusd,
}

impl Instrument {
    /// Every catalogue instrument, in catalogue order
    pub const ALL: [Instrument; 10] = [
        Instrument::Xauusd,
        Instrument::Xagusd,
        Instrument::Btcusd,
        Instrument::Ethusd,
        Instrument::Eurusd,
        Instrument::Gbpusd,
        Instrument::Usdjpy,
        Instrument::Gbpjpy,
        Instrument::Eurjpy,
        Instrument::Audusd,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Instrument::Xauusd => "XAUUSD",
            Instrument::Xagusd => "XAGUSD",
            Instrument::Btcusd => "BTCUSD",
            Instrument::Ethusd => "ETHUSD",
            Instrument::Eurusd => "EURUSD",
            Instrument::Gbpusd => "GBPUSD",
            Instrument::Usdjpy => "USDJPY",
            Instrument::Gbpjpy => "GBPJPY",
            Instrument::Eurjpy => "EURJPY",
            Instrument::Audusd => "AUDUSD",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Instrument::Xauusd | Instrument::Xagusd => Category::PreciousMetals,
            Instrument::Btcusd | Instrument::Ethusd => Category::Cryptocurrency,
            Instrument::Eurusd | Instrument::Gbpusd | Instrument::Usdjpy => Category::ForexMajor,
            Instrument::Gbpjpy | Instrument::Eurjpy | Instrument::Audusd => Category::ForexPairs,
        }
    }

    /// Display precision, a function of catalogue identity only
    pub fn decimal_places(&self) -> u8 {
        self.category().decimal_places()
    }

    /// Look up a relay symbol (case-insensitive, surrounding whitespace ignored)
    pub fn from_symbol(symbol: &str) -> Option<Instrument> {
        let symbol = symbol.trim();
        Instrument::ALL
            .into_iter()
            .find(|instrument| instrument.symbol().eq_ignore_ascii_case(symbol))
    }
}

impl std::str::FromStr for Instrument {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Instrument::from_symbol(s).ok_or_else(|| format!("unknown instrument: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_places_is_total() {
        for instrument in Instrument::ALL {
            let places = instrument.decimal_places();
            assert!(places == 2 || places == 5, "{instrument} -> {places}");
            assert_eq!(places, instrument.decimal_places());
        }
    }

    #[test]
    fn test_decimal_places_by_category() {
        struct TestCase {
            input: Instrument,
            expected: u8,
        }

        let tests = vec![
            TestCase {
                // TC0: precious metal
                input: Instrument::Xauusd,
                expected: 2,
            },
            TestCase {
                // TC1: crypto
                input: Instrument::Btcusd,
                expected: 2,
            },
            TestCase {
                // TC2: forex major
                input: Instrument::Eurusd,
                expected: 5,
            },
            TestCase {
                // TC3: forex pair
                input: Instrument::Gbpjpy,
                expected: 5,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(test.input.decimal_places(), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_from_symbol() {
        assert_eq!(Instrument::from_symbol("XAUUSD"), Some(Instrument::Xauusd));
        assert_eq!(Instrument::from_symbol(" btcusd "), Some(Instrument::Btcusd));
        assert_eq!(Instrument::from_symbol("DOGEUSD"), None);
        assert_eq!(Instrument::from_symbol(""), None);
    }

    #[test]
    fn test_serde_uses_symbol() {
        for instrument in Instrument::ALL {
            let json = serde_json::to_string(&instrument).unwrap();
            assert_eq!(json, format!("\"{}\"", instrument.symbol()));
            assert_eq!(serde_json::from_str::<Instrument>(&json).unwrap(), instrument);
        }
    }

    #[test]
    fn test_display_matches_symbol() {
        for instrument in Instrument::ALL {
            assert_eq!(instrument.to_string(), instrument.symbol());
            assert_eq!(instrument.symbol().parse::<Instrument>(), Ok(instrument));
        }
    }
}
