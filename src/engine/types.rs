use std::fmt;

use serde::{Deserialize, Serialize};

/// Spot or derivatives venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Spot,
    Futures,
}

impl MarketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::Spot => "spot",
            MarketType::Futures => "futures",
        }
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side of the aggressor. Venues report it either directly or as a
/// maker flag ("buyer was maker" means the taker sold).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TakerSide {
    Buy,
    Sell,
}

impl TakerSide {
    pub fn from_buyer_maker(buyer_is_maker: bool) -> Self {
        if buyer_is_maker { TakerSide::Sell } else { TakerSide::Buy }
    }
}

impl fmt::Display for TakerSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TakerSide::Buy => f.write_str("buy"),
            TakerSide::Sell => f.write_str("sell"),
        }
    }
}

/// Every venue the registry knows about. Closed on purpose: adding one
/// means adding a variant here and a descriptor in the registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum VenueId {
    // Spot
    Binance,
    Coinbase,
    Kraken,
    Okx,
    Bybit,
    Kucoin,
    Bitfinex,
    Huobi,
    Mexc,
    Gateio,
    // Futures / perpetuals
    BinanceFutures,
    BybitPerp,
    OkxSwap,
    BitfinexPerp,
    KucoinFutures,
    HuobiFutures,
    Deribit,
    MexcFutures,
    GateioFutures,
}

impl VenueId {
    pub const ALL: [VenueId; 19] = [
        VenueId::Binance,
        VenueId::Coinbase,
        VenueId::Kraken,
        VenueId::Okx,
        VenueId::Bybit,
        VenueId::Kucoin,
        VenueId::Bitfinex,
        VenueId::Huobi,
        VenueId::Mexc,
        VenueId::Gateio,
        VenueId::BinanceFutures,
        VenueId::BybitPerp,
        VenueId::OkxSwap,
        VenueId::BitfinexPerp,
        VenueId::KucoinFutures,
        VenueId::HuobiFutures,
        VenueId::Deribit,
        VenueId::MexcFutures,
        VenueId::GateioFutures,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VenueId::Binance => "binance",
            VenueId::Coinbase => "coinbase",
            VenueId::Kraken => "kraken",
            VenueId::Okx => "okx",
            VenueId::Bybit => "bybit",
            VenueId::Kucoin => "kucoin",
            VenueId::Bitfinex => "bitfinex",
            VenueId::Huobi => "huobi",
            VenueId::Mexc => "mexc",
            VenueId::Gateio => "gateio",
            VenueId::BinanceFutures => "binance-futures",
            VenueId::BybitPerp => "bybit-perp",
            VenueId::OkxSwap => "okx-swap",
            VenueId::BitfinexPerp => "bitfinex-perp",
            VenueId::KucoinFutures => "kucoin-futures",
            VenueId::HuobiFutures => "huobi-futures",
            VenueId::Deribit => "deribit",
            VenueId::MexcFutures => "mexc-futures",
            VenueId::GateioFutures => "gateio-futures",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let wanted = value.trim().to_ascii_lowercase();
        Self::ALL.iter().copied().find(|v| v.as_str() == wanted)
    }
}

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical trade record. Price and quantity stay as the venue's decimal
/// strings; numeric views are derived on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub price: String,
    pub quantity: String,
    pub timestamp_ms: i64,
    pub taker_side: TakerSide,
    pub instrument: String,
    pub venue: VenueId,
    pub market_type: MarketType,
}

impl Trade {
    /// price * quantity using a plain float parse. Display-grade only;
    /// an unparsable field yields 0.
    pub fn notional(&self) -> f64 {
        let price = self.price.parse::<f64>().unwrap_or(0.0);
        let quantity = self.quantity.parse::<f64>().unwrap_or(0.0);
        let value = price * quantity;
        if value.is_finite() { value } else { 0.0 }
    }
}

/// One (price, quantity) pair as published by a single venue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub quantity: f64,
}

impl BookLevel {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }
}

/// Connectivity as reported to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(price: &str, quantity: &str) -> Trade {
        Trade {
            id: "t-1".into(),
            price: price.into(),
            quantity: quantity.into(),
            timestamp_ms: 0,
            taker_side: TakerSide::Buy,
            instrument: "BTCUSDT".into(),
            venue: VenueId::Binance,
            market_type: MarketType::Spot,
        }
    }

    #[test]
    fn test_venue_id_round_trips_through_str() {
        for venue in VenueId::ALL {
            assert_eq!(VenueId::parse(venue.as_str()), Some(venue));
        }
        assert_eq!(VenueId::parse(" OKX-Swap "), Some(VenueId::OkxSwap));
        assert_eq!(VenueId::parse("ftx"), None);
    }

    #[test]
    fn test_venue_id_serde_matches_as_str() {
        let json = serde_json::to_string(&VenueId::BitfinexPerp).unwrap();
        assert_eq!(json, "\"bitfinex-perp\"");
    }

    #[test]
    fn test_taker_side_from_maker_flag() {
        assert_eq!(TakerSide::from_buyer_maker(true), TakerSide::Sell);
        assert_eq!(TakerSide::from_buyer_maker(false), TakerSide::Buy);
    }

    #[test]
    fn test_notional() {
        assert!((trade("100.5", "2").notional() - 201.0).abs() < 1e-9);
        assert_eq!(trade("abc", "2").notional(), 0.0);
        assert_eq!(trade("1e308", "1e308").notional(), 0.0);
    }
}
