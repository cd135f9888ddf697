// Shared trait + helpers for venue adapters

use std::time::Duration;

use serde_json::Value;

use crate::engine::instrument::Instrument;
use crate::engine::types::{MarketType, TakerSide, Trade, VenueId};
use crate::market_data::external_book::OrderBookSnapshot;

pub mod binance;
pub mod bitfinex;
pub mod bybit;
pub mod coinbase;
pub mod deribit;
pub mod gateio;
pub mod huobi;
pub mod kraken;
pub mod kucoin;
pub mod mexc;
pub mod okx;

/// Application-level ping for venues that drop quiet clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    pub every: Duration,
    pub frame: String,
}

impl Heartbeat {
    pub fn new(every_secs: u64, frame: impl Into<String>) -> Self {
        Self { every: Duration::from_secs(every_secs), frame: frame.into() }
    }
}

/// What one decoded frame turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum VenueUpdate {
    Trade(Trade),
    Book(OrderBookSnapshot),
}

/// Protocol descriptor for one venue. Implementations hold no mutable
/// state and every method is total: frames that are not trades or book
/// updates for this venue give `None`.
pub trait VenueAdapter: Send + Sync {
    fn id(&self) -> VenueId;

    fn market_type(&self) -> MarketType;

    fn display_name(&self) -> &'static str;

    /// `None` means the venue cannot serve this instrument. The venue then
    /// stays inert for the whole selection.
    fn build_endpoint(&self, instrument: &Instrument) -> Option<String>;

    /// Frames sent once, right after the socket opens.
    fn build_subscription(&self, _instrument: &Instrument) -> Vec<Value> {
        Vec::new()
    }

    fn parse_trade(&self, instrument: &Instrument, frame: &Value) -> Option<Trade>;

    fn parse_book_update(&self, _frame: &Value) -> Option<OrderBookSnapshot> {
        None
    }

    /// Reply to venue-initiated keepalives (ping ids and the like).
    fn on_message(&self, _frame: &Value) -> Option<String> {
        None
    }

    fn heartbeat(&self) -> Option<Heartbeat> {
        None
    }

    fn supports_book(&self) -> bool {
        false
    }
}

/// Offer a decoded frame to both parsers.
pub fn interpret(adapter: &dyn VenueAdapter, instrument: &Instrument, frame: &Value) -> Option<VenueUpdate> {
    if let Some(trade) = adapter.parse_trade(instrument, frame) {
        return Some(VenueUpdate::Trade(trade));
    }
    adapter.parse_book_update(frame).map(VenueUpdate::Book)
}

/// Fields every parser extracts, before they are stamped with venue and
/// instrument.
pub(crate) struct RawTrade {
    pub native_id: String,
    pub price: String,
    pub quantity: String,
    pub timestamp_ms: i64,
    pub taker_side: TakerSide,
}

impl RawTrade {
    pub fn into_trade(self, adapter: &dyn VenueAdapter, instrument: &Instrument) -> Trade {
        Trade {
            id: format!("{}-{}", adapter.id(), self.native_id),
            price: self.price,
            quantity: self.quantity,
            timestamp_ms: self.timestamp_ms,
            taker_side: self.taker_side,
            instrument: instrument.symbol().to_string(),
            venue: adapter.id(),
            market_type: adapter.market_type(),
        }
    }
}

/// `"buy"`/`"sell"` in any case.
pub(crate) fn side_word(v: &Value) -> Option<TakerSide> {
    match v.as_str()?.to_ascii_lowercase().as_str() {
        "buy" | "b" => Some(TakerSide::Buy),
        "sell" | "s" => Some(TakerSide::Sell),
        _ => None,
    }
}

/// Numeric side codes used by MEXC: 1 buy, 2 sell.
pub(crate) fn side_code(v: &Value) -> Option<TakerSide> {
    match v.as_i64()? {
        1 => Some(TakerSide::Buy),
        2 => Some(TakerSide::Sell),
        _ => None,
    }
}

/// First element of a JSON array, or the value itself when it is an object.
pub(crate) fn first_or_self(v: &Value) -> Option<&Value> {
    match v {
        Value::Array(items) => items.first(),
        Value::Object(_) => Some(v),
        _ => None,
    }
}
