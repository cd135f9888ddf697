use std::fmt;

use serde::Serialize;

use crate::error::InstrumentError;

/// Symbols offered for selection, in display order.
pub const CATALOGUE: [&str; 15] = [
    "BTCUSDT", "ETHUSDT", "SOLUSDT", "XRPUSDT", "LINKUSDT", "ADAUSDT", "DOGEUSDT", "AVAXUSDT",
    "MATICUSDT", "DOTUSDT", "LTCUSDT", "UNIUSDT", "BTCUSDC", "ETHUSDC", "SOLUSDC",
];

const QUOTES: [&str; 2] = ["USDT", "USDC"];

/// A tradable pair such as `BTCUSDT`, with the per-venue spellings that
/// the adapters need.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Instrument {
    symbol: String,
    base: String,
    quote: String,
}

impl Instrument {
    pub fn from_symbol(symbol: &str) -> Result<Self, InstrumentError> {
        let symbol = symbol.trim().to_ascii_uppercase();
        if symbol.is_empty() {
            return Err(InstrumentError::Empty);
        }
        let quote = QUOTES
            .iter()
            .find(|q| symbol.ends_with(*q) && symbol.len() > q.len())
            .ok_or_else(|| InstrumentError::UnsupportedQuote { symbol: symbol.clone() })?;
        let base = symbol[..symbol.len() - quote.len()].to_string();
        Ok(Self { base, quote: quote.to_string(), symbol })
    }

    pub fn catalogue() -> Vec<Instrument> {
        CATALOGUE
            .iter()
            .filter_map(|s| Instrument::from_symbol(s).ok())
            .collect()
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// `BTC/USDT`
    pub fn label(&self) -> String {
        self.joined("/")
    }

    pub fn lower(&self) -> String {
        self.symbol.to_ascii_lowercase()
    }

    /// Base and quote joined by `sep`, e.g. `BTC-USDT`, `BTC_USDT`.
    pub fn joined(&self, sep: &str) -> String {
        format!("{}{}{}", self.base, sep, self.quote)
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)
    }
}
