// Bybit v5 public streams (spot + linear perpetuals)

use serde_json::{json, Value};

use super::{side_word, Heartbeat, RawTrade, VenueAdapter};
use crate::engine::instrument::Instrument;
use crate::engine::types::{MarketType, Trade, VenueId};
use crate::market_data::external_book::OrderBookSnapshot;
use crate::market_data::normaliser;

const BOOK_DEPTH: u32 = 50;

pub struct BybitAdapter {
    pub venue: VenueId,
    pub market: MarketType,
    pub name: &'static str,
    pub url: &'static str,
}

pub static BYBIT_SPOT: BybitAdapter = BybitAdapter {
    venue: VenueId::Bybit,
    market: MarketType::Spot,
    name: "Bybit",
    url: "wss://stream.bybit.com/v5/public/spot",
};

pub static BYBIT_PERP: BybitAdapter = BybitAdapter {
    venue: VenueId::BybitPerp,
    market: MarketType::Futures,
    name: "Bybit Perp",
    url: "wss://stream.bybit.com/v5/public/linear",
};

fn topic(frame: &Value) -> Option<&str> {
    frame.get("topic")?.as_str()
}

impl VenueAdapter for BybitAdapter {
    fn id(&self) -> VenueId {
        self.venue
    }

    fn market_type(&self) -> MarketType {
        self.market
    }

    fn display_name(&self) -> &'static str {
        self.name
    }

    fn build_endpoint(&self, _instrument: &Instrument) -> Option<String> {
        Some(self.url.to_string())
    }

    fn build_subscription(&self, instrument: &Instrument) -> Vec<Value> {
        let sym = instrument.symbol();
        vec![json!({
            "op": "subscribe",
            "args": [format!("publicTrade.{sym}"), format!("orderbook.{BOOK_DEPTH}.{sym}")],
        })]
    }

    fn parse_trade(&self, instrument: &Instrument, frame: &Value) -> Option<Trade> {
        if !topic(frame)?.starts_with("publicTrade.") {
            return None;
        }
        let trade = frame.get("data")?.as_array()?.first()?;
        let raw = RawTrade {
            native_id: normaliser::id_string(trade.get("i")?)?,
            price: normaliser::decimal_string(trade.get("p")?)?,
            quantity: normaliser::decimal_string(trade.get("v")?)?,
            timestamp_ms: normaliser::epoch_ms(trade.get("T")?)?,
            taker_side: side_word(trade.get("S")?)?,
        };
        Some(raw.into_trade(self, instrument))
    }

    // Snapshot and delta messages are both taken as the full book.
    fn parse_book_update(&self, frame: &Value) -> Option<OrderBookSnapshot> {
        if !topic(frame)?.starts_with("orderbook.") {
            return None;
        }
        let data = frame.get("data")?;
        Some(OrderBookSnapshot::new(
            normaliser::levels(data.get("b")?)?,
            normaliser::levels(data.get("a")?)?,
        ))
    }

    fn heartbeat(&self) -> Option<Heartbeat> {
        Some(Heartbeat::new(20, r#"{"op":"ping"}"#))
    }

    fn supports_book(&self) -> bool {
        true
    }
}
