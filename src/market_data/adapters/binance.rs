// Binance spot + USD-M futures. One combined-stream socket carries both the
// trade stream and the 10-level partial depth stream.

use serde_json::Value;

use super::{RawTrade, VenueAdapter};
use crate::engine::instrument::Instrument;
use crate::engine::types::{MarketType, TakerSide, Trade, VenueId};
use crate::market_data::external_book::OrderBookSnapshot;
use crate::market_data::normaliser;

pub struct BinanceAdapter {
    pub venue: VenueId,
    pub market: MarketType,
    pub name: &'static str,
    pub stream_host: &'static str,
}

pub static BINANCE_SPOT: BinanceAdapter = BinanceAdapter {
    venue: VenueId::Binance,
    market: MarketType::Spot,
    name: "Binance",
    stream_host: "wss://stream.binance.com:9443",
};

pub static BINANCE_FUTURES: BinanceAdapter = BinanceAdapter {
    venue: VenueId::BinanceFutures,
    market: MarketType::Futures,
    name: "Binance Futures",
    stream_host: "wss://fstream.binance.com",
};

// Combined streams wrap the payload as {"stream": .., "data": ..}.
fn payload(frame: &Value) -> Option<&Value> {
    match frame.get("stream") {
        Some(_) => frame.get("data"),
        None => Some(frame),
    }
}

impl VenueAdapter for BinanceAdapter {
    fn id(&self) -> VenueId {
        self.venue
    }

    fn market_type(&self) -> MarketType {
        self.market
    }

    fn display_name(&self) -> &'static str {
        self.name
    }

    fn build_endpoint(&self, instrument: &Instrument) -> Option<String> {
        let sym = instrument.lower();
        Some(format!("{}/stream?streams={sym}@trade/{sym}@depth10@100ms", self.stream_host))
    }

    fn parse_trade(&self, instrument: &Instrument, frame: &Value) -> Option<Trade> {
        let data = payload(frame)?;
        if data.get("e")?.as_str()? != "trade" {
            return None;
        }
        let raw = RawTrade {
            native_id: normaliser::id_string(data.get("t")?)?,
            price: normaliser::decimal_string(data.get("p")?)?,
            quantity: normaliser::decimal_string(data.get("q")?)?,
            timestamp_ms: normaliser::epoch_ms(data.get("T")?)?,
            taker_side: TakerSide::from_buyer_maker(data.get("m")?.as_bool()?),
        };
        Some(raw.into_trade(self, instrument))
    }

    fn parse_book_update(&self, frame: &Value) -> Option<OrderBookSnapshot> {
        let data = payload(frame)?;
        // spot partial depth: {lastUpdateId, bids, asks}; futures: {e: depthUpdate, b, a}
        let (bids, asks) = match (data.get("bids"), data.get("asks")) {
            (Some(b), Some(a)) => (b, a),
            _ => (data.get("b")?, data.get("a")?),
        };
        Some(OrderBookSnapshot::new(normaliser::levels(bids)?, normaliser::levels(asks)?))
    }

    fn supports_book(&self) -> bool {
        true
    }
}
