// Coinbase Exchange feed: `matches` for trades, `level2_batch` snapshot for the book.

use serde_json::{json, Value};

use super::{RawTrade, VenueAdapter};
use crate::engine::instrument::Instrument;
use crate::engine::types::{MarketType, TakerSide, Trade, VenueId};
use crate::market_data::external_book::OrderBookSnapshot;
use crate::market_data::normaliser;

const SNAPSHOT_DEPTH: usize = 10;

pub struct CoinbaseAdapter;

pub static COINBASE: CoinbaseAdapter = CoinbaseAdapter;

impl VenueAdapter for CoinbaseAdapter {
    fn id(&self) -> VenueId {
        VenueId::Coinbase
    }

    fn market_type(&self) -> MarketType {
        MarketType::Spot
    }

    fn display_name(&self) -> &'static str {
        "Coinbase"
    }

    fn build_endpoint(&self, _instrument: &Instrument) -> Option<String> {
        Some("wss://ws-feed.exchange.coinbase.com".to_string())
    }

    fn build_subscription(&self, instrument: &Instrument) -> Vec<Value> {
        vec![json!({
            "type": "subscribe",
            "product_ids": [instrument.joined("-")],
            "channels": ["matches", "level2_batch"],
        })]
    }

    fn parse_trade(&self, instrument: &Instrument, frame: &Value) -> Option<Trade> {
        if frame.get("type")?.as_str()? != "match" {
            return None;
        }
        // `side` is the maker's side, so a resting sell means the taker bought.
        let maker_side = frame.get("side")?.as_str()?;
        let taker_side = match maker_side {
            "sell" => TakerSide::Buy,
            "buy" => TakerSide::Sell,
            _ => return None,
        };
        let raw = RawTrade {
            native_id: normaliser::id_string(frame.get("trade_id")?)?,
            price: normaliser::decimal_string(frame.get("price")?)?,
            quantity: normaliser::decimal_string(frame.get("size")?)?,
            timestamp_ms: normaliser::rfc3339_ms(frame.get("time")?)?,
            taker_side,
        };
        Some(raw.into_trade(self, instrument))
    }

    fn parse_book_update(&self, frame: &Value) -> Option<OrderBookSnapshot> {
        if frame.get("type")?.as_str()? != "snapshot" {
            return None;
        }
        let book = OrderBookSnapshot::new(
            normaliser::levels(frame.get("bids")?)?,
            normaliser::levels(frame.get("asks")?)?,
        );
        Some(book.truncated(SNAPSHOT_DEPTH))
    }

    fn supports_book(&self) -> bool {
        true
    }
}
