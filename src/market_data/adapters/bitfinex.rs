// Bitfinex v2 public trades. Amount sign carries the taker side.

use serde_json::{json, Value};

use super::{RawTrade, VenueAdapter};
use crate::engine::instrument::Instrument;
use crate::engine::types::{MarketType, TakerSide, Trade, VenueId};
use crate::market_data::normaliser;

pub struct BitfinexAdapter {
    pub venue: VenueId,
    pub market: MarketType,
    pub name: &'static str,
}

pub static BITFINEX_SPOT: BitfinexAdapter = BitfinexAdapter {
    venue: VenueId::Bitfinex,
    market: MarketType::Spot,
    name: "Bitfinex",
};

pub static BITFINEX_PERP: BitfinexAdapter = BitfinexAdapter {
    venue: VenueId::BitfinexPerp,
    market: MarketType::Futures,
    name: "Bitfinex Perp",
};

impl BitfinexAdapter {
    fn symbol(&self, instrument: &Instrument) -> Option<String> {
        // Bitfinex tickers: UST for tether, UDC for USD coin
        let quote = match instrument.quote() {
            "USDT" => "UST",
            "USDC" => "UDC",
            _ => return None,
        };
        match self.market {
            MarketType::Spot => Some(format!("t{}{}", instrument.base(), quote)),
            // perpetuals are only margined in tether
            MarketType::Futures if quote == "UST" => Some(format!("t{}F0:USTF0", instrument.base())),
            MarketType::Futures => None,
        }
    }
}

impl VenueAdapter for BitfinexAdapter {
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
        self.symbol(instrument)?;
        Some("wss://api-pub.bitfinex.com/ws/2".to_string())
    }

    fn build_subscription(&self, instrument: &Instrument) -> Vec<Value> {
        self.symbol(instrument)
            .map(|symbol| json!({"event": "subscribe", "channel": "trades", "symbol": symbol}))
            .into_iter()
            .collect()
    }

    // [chan, [[ID, MTS, AMOUNT, PRICE], ..]] snapshot, [chan, "te", [ID, MTS, AMOUNT, PRICE]] update.
    // Heartbeats ([chan, "hb"]) and "tu" confirmations are dropped.
    fn parse_trade(&self, instrument: &Instrument, frame: &Value) -> Option<Trade> {
        let frame = frame.as_array()?;
        let trade = match frame.get(1)? {
            Value::String(kind) if kind == "te" => frame.get(2)?,
            Value::Array(batch) => batch.last()?,
            _ => return None,
        };
        let fields = trade.as_array()?;
        let amount = normaliser::number(fields.get(2)?)?;
        let raw = RawTrade {
            native_id: normaliser::id_string(fields.first()?)?,
            timestamp_ms: normaliser::epoch_ms(fields.get(1)?)?,
            quantity: normaliser::abs_decimal_string(fields.get(2)?)?,
            price: normaliser::abs_decimal_string(fields.get(3)?)?,
            taker_side: if amount < 0.0 { TakerSide::Sell } else { TakerSide::Buy },
        };
        Some(raw.into_trade(self, instrument))
    }
}
