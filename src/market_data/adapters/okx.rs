// OKX v5 public channel. Spot and swap share one host and differ only by
// instrument id.

use serde_json::{json, Value};

use super::{side_word, Heartbeat, RawTrade, VenueAdapter};
use crate::engine::instrument::Instrument;
use crate::engine::types::{MarketType, Trade, VenueId};
use crate::market_data::external_book::OrderBookSnapshot;
use crate::market_data::normaliser;

const PUBLIC_URL: &str = "wss://ws.okx.com:8443/ws/v5/public";

pub struct OkxAdapter {
    pub venue: VenueId,
    pub market: MarketType,
    pub name: &'static str,
}

pub static OKX_SPOT: OkxAdapter = OkxAdapter {
    venue: VenueId::Okx,
    market: MarketType::Spot,
    name: "OKX",
};

pub static OKX_SWAP: OkxAdapter = OkxAdapter {
    venue: VenueId::OkxSwap,
    market: MarketType::Futures,
    name: "OKX Swap",
};

impl OkxAdapter {
    fn inst_id(&self, instrument: &Instrument) -> String {
        match self.market {
            MarketType::Spot => instrument.joined("-"),
            MarketType::Futures => format!("{}-SWAP", instrument.joined("-")),
        }
    }
}

fn channel(frame: &Value) -> Option<&str> {
    frame.get("arg")?.get("channel")?.as_str()
}

impl VenueAdapter for OkxAdapter {
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
        Some(PUBLIC_URL.to_string())
    }

    fn build_subscription(&self, instrument: &Instrument) -> Vec<Value> {
        let inst_id = self.inst_id(instrument);
        vec![json!({
            "op": "subscribe",
            "args": [
                {"channel": "trades", "instId": inst_id},
                {"channel": "books5", "instId": inst_id},
            ],
        })]
    }

    fn parse_trade(&self, instrument: &Instrument, frame: &Value) -> Option<Trade> {
        if channel(frame)? != "trades" {
            return None;
        }
        let trade = frame.get("data")?.as_array()?.first()?;
        let raw = RawTrade {
            native_id: normaliser::id_string(trade.get("tradeId")?)?,
            price: normaliser::decimal_string(trade.get("px")?)?,
            quantity: normaliser::decimal_string(trade.get("sz")?)?,
            timestamp_ms: normaliser::epoch_ms(trade.get("ts")?)?,
            taker_side: side_word(trade.get("side")?)?,
        };
        Some(raw.into_trade(self, instrument))
    }

    fn parse_book_update(&self, frame: &Value) -> Option<OrderBookSnapshot> {
        if channel(frame)? != "books5" {
            return None;
        }
        let book = frame.get("data")?.as_array()?.first()?;
        Some(OrderBookSnapshot::new(
            normaliser::levels(book.get("bids")?)?,
            normaliser::levels(book.get("asks")?)?,
        ))
    }

    // The reply is a bare "pong", which never decodes as JSON.
    fn heartbeat(&self) -> Option<Heartbeat> {
        Some(Heartbeat::new(25, "ping"))
    }

    fn supports_book(&self) -> bool {
        true
    }
}
