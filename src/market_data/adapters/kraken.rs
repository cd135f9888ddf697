// Kraken websocket v1. Data frames are positional arrays:
// [channelID, payload, channelName, pair]

use serde_json::{json, Value};

use super::{side_word, Heartbeat, RawTrade, VenueAdapter};
use crate::engine::instrument::Instrument;
use crate::engine::types::{MarketType, Trade, VenueId};
use crate::market_data::external_book::OrderBookSnapshot;
use crate::market_data::normaliser;

pub struct KrakenAdapter;

pub static KRAKEN: KrakenAdapter = KrakenAdapter;

impl KrakenAdapter {
    // Kraken still lists bitcoin as XBT on v1.
    fn pair(instrument: &Instrument) -> String {
        let base = match instrument.base() {
            "BTC" => "XBT",
            other => other,
        };
        format!("{}/{}", base, instrument.quote())
    }
}

fn channel_name(frame: &[Value]) -> Option<&str> {
    frame.get(2)?.as_str()
}

impl VenueAdapter for KrakenAdapter {
    fn id(&self) -> VenueId {
        VenueId::Kraken
    }

    fn market_type(&self) -> MarketType {
        MarketType::Spot
    }

    fn display_name(&self) -> &'static str {
        "Kraken"
    }

    fn build_endpoint(&self, _instrument: &Instrument) -> Option<String> {
        Some("wss://ws.kraken.com".to_string())
    }

    fn build_subscription(&self, instrument: &Instrument) -> Vec<Value> {
        let pair = Self::pair(instrument);
        vec![
            json!({"event": "subscribe", "pair": [pair], "subscription": {"name": "trade"}}),
            json!({"event": "subscribe", "pair": [pair], "subscription": {"name": "book", "depth": 10}}),
        ]
    }

    fn parse_trade(&self, instrument: &Instrument, frame: &Value) -> Option<Trade> {
        let frame = frame.as_array()?;
        if channel_name(frame).is_some_and(|name| name != "trade") {
            return None;
        }
        // latest execution of the batch
        let trade = frame.get(1)?.as_array()?.last()?.as_array()?;
        let price = normaliser::decimal_string(trade.first()?)?;
        let quantity = normaliser::decimal_string(trade.get(1)?)?;
        let time = trade.get(2)?;
        let taker_side = side_word(trade.get(3)?)?;
        // v1 trades carry no id; time, price, volume and side stand in for one
        let native_id = format!("{}-{}-{}-{}", time.as_str()?, price, quantity, taker_side);
        let raw = RawTrade {
            native_id,
            timestamp_ms: normaliser::seconds_to_ms(time)?,
            taker_side,
            price,
            quantity,
        };
        Some(raw.into_trade(self, instrument))
    }

    // Only the initial `as`/`bs` snapshot is a full book; `a`/`b` updates are skipped.
    fn parse_book_update(&self, frame: &Value) -> Option<OrderBookSnapshot> {
        let frame = frame.as_array()?;
        if channel_name(frame).is_some_and(|name| !name.starts_with("book")) {
            return None;
        }
        let book = frame.get(1)?.as_object()?;
        Some(OrderBookSnapshot::new(
            normaliser::levels(book.get("bs")?)?,
            normaliser::levels(book.get("as")?)?,
        ))
    }

    fn heartbeat(&self) -> Option<Heartbeat> {
        Some(Heartbeat::new(30, r#"{"event":"ping"}"#))
    }

    fn supports_book(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{BookLevel, TakerSide};

    fn btc() -> Instrument {
        Instrument::from_symbol("BTCUSDT").unwrap()
    }

    #[test]
    fn test_subscriptions_use_kraken_pair() {
        let subs = KRAKEN.build_subscription(&btc());
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0]["pair"], json!(["XBT/USDT"]));
        assert_eq!(subs[1]["subscription"]["name"], "book");
    }

    #[test]
    fn test_parse_takes_last_trade_of_batch() {
        let frame = json!([0, [
            ["5541.20000", "0.15850568", "1534614057.321597", "s", "l", ""],
            ["6060.00000", "0.02455000", "1534614057.324998", "b", "l", ""]
        ], "trade", "XBT/USDT"]);
        let trade = KRAKEN.parse_trade(&btc(), &frame).unwrap();
        assert_eq!(trade.price, "6060.00000");
        assert_eq!(trade.taker_side, TakerSide::Buy);
        assert_eq!(trade.timestamp_ms, 1_534_614_057_324);
        assert_eq!(trade.id, "kraken-1534614057.324998-6060.00000-0.02455000-buy");

        let mirrored = json!([0, [["6060.00000", "0.02455000", "1534614057.324998", "s", "l", ""]], "trade", "XBT/USDT"]);
        assert_ne!(KRAKEN.parse_trade(&btc(), &mirrored).unwrap().id, trade.id);
    }

    #[test]
    fn test_parse_book_snapshot_only() {
        let snapshot = json!([0, {"as": [["5541.3", "2.5", "1534614248.123678"]],
                                  "bs": [["5541.2", "1.5", "1534614248.765567"]]}, "book-10", "XBT/USDT"]);
        let book = KRAKEN.parse_book_update(&snapshot).unwrap();
        assert_eq!(book.bids, vec![BookLevel::new(5541.2, 1.5)]);
        assert_eq!(book.asks, vec![BookLevel::new(5541.3, 2.5)]);
        assert!(KRAKEN.parse_trade(&btc(), &snapshot).is_none());

        let update = json!([0, {"a": [["5541.3", "2.5", "1534614248.456738"]]}, "book-10", "XBT/USDT"]);
        assert!(KRAKEN.parse_book_update(&update).is_none());
    }

    #[test]
    fn test_ignores_events() {
        assert!(KRAKEN.parse_trade(&btc(), &json!({"event": "heartbeat"})).is_none());
        assert!(KRAKEN.parse_book_update(&json!({"event": "systemStatus"})).is_none());
        assert!(KRAKEN.parse_trade(&btc(), &json!([1, []])).is_none());
    }
}
