// Gate.io v4 spot and USDT futures trade channels.

use serde_json::{json, Value};

use super::{first_or_self, side_word, Heartbeat, RawTrade, VenueAdapter};
use crate::engine::instrument::Instrument;
use crate::engine::types::{MarketType, TakerSide, Trade, VenueId};
use crate::market_data::normaliser;

pub struct GateioAdapter {
    pub venue: VenueId,
    pub market: MarketType,
    pub name: &'static str,
    pub channel: &'static str,
}

pub static GATEIO_SPOT: GateioAdapter = GateioAdapter {
    venue: VenueId::Gateio,
    market: MarketType::Spot,
    name: "Gate.io",
    channel: "spot",
};

pub static GATEIO_FUTURES: GateioAdapter = GateioAdapter {
    venue: VenueId::GateioFutures,
    market: MarketType::Futures,
    name: "Gate.io Futures",
    channel: "futures",
};

impl GateioAdapter {
    fn trades_channel(&self) -> String {
        format!("{}.trades", self.channel)
    }
}

// Gate stamps requests with the current unix second.
fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

impl VenueAdapter for GateioAdapter {
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
        match (self.market, instrument.quote()) {
            (MarketType::Spot, _) => Some("wss://api.gateio.ws/ws/v4/".to_string()),
            (MarketType::Futures, "USDT") => Some("wss://fx-ws.gateio.ws/v4/ws/usdt".to_string()),
            // no USDC-settled futures host
            (MarketType::Futures, _) => None,
        }
    }

    fn build_subscription(&self, instrument: &Instrument) -> Vec<Value> {
        vec![json!({
            "time": now_secs(),
            "channel": self.trades_channel(),
            "event": "subscribe",
            "payload": [instrument.joined("_")],
        })]
    }

    fn parse_trade(&self, instrument: &Instrument, frame: &Value) -> Option<Trade> {
        if frame.get("event")?.as_str()? != "update" || frame.get("channel")?.as_str()? != self.trades_channel() {
            return None;
        }
        let result = frame.get("result")?;
        let raw = match self.market {
            MarketType::Spot => {
                let trade = result.as_object()?;
                RawTrade {
                    native_id: normaliser::id_string(trade.get("id")?)?,
                    price: normaliser::decimal_string(trade.get("price")?)?,
                    quantity: normaliser::decimal_string(trade.get("amount")?)?,
                    timestamp_ms: normaliser::epoch_ms(trade.get("create_time_ms")?)?,
                    taker_side: side_word(trade.get("side")?)?,
                }
            }
            MarketType::Futures => {
                // futures encode the side in the sign of `size`
                let trade = first_or_self(result)?;
                let size = trade.get("size")?;
                RawTrade {
                    native_id: normaliser::id_string(trade.get("id")?)?,
                    price: normaliser::decimal_string(trade.get("price")?)?,
                    quantity: normaliser::abs_decimal_string(size)?,
                    timestamp_ms: normaliser::epoch_ms(trade.get("create_time_ms")?)?,
                    taker_side: if normaliser::number(size)? < 0.0 { TakerSide::Sell } else { TakerSide::Buy },
                }
            }
        };
        Some(raw.into_trade(self, instrument))
    }

    fn heartbeat(&self) -> Option<Heartbeat> {
        Some(Heartbeat::new(20, json!({"channel": format!("{}.ping", self.channel)}).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn btc() -> Instrument {
        Instrument::from_symbol("BTCUSDT").unwrap()
    }

    #[test]
    fn test_subscription_shape() {
        let sub = &GATEIO_SPOT.build_subscription(&btc())[0];
        assert_eq!(sub["channel"], "spot.trades");
        assert_eq!(sub["payload"], json!(["BTC_USDT"]));
        assert!(sub["time"].as_i64().unwrap() > 1_600_000_000);
        assert_eq!(GATEIO_FUTURES.build_subscription(&btc())[0]["channel"], "futures.trades");
    }

    #[test]
    fn test_usdc_futures_have_no_endpoint() {
        let usdc = Instrument::from_symbol("BTCUSDC").unwrap();
        assert!(GATEIO_FUTURES.build_endpoint(&usdc).is_none());
        assert!(GATEIO_SPOT.build_endpoint(&usdc).is_some());
    }

    #[test]
    fn test_parse_spot_update() {
        let frame = json!({"time": 1606292218, "channel": "spot.trades", "event": "update",
            "result": {"id": 309143071, "create_time": 1606292218, "create_time_ms": "1606292218213.4578",
                       "side": "sell", "currency_pair": "BTC_USDT", "amount": "16.4700000000", "price": "0.4705000000"}});
        let trade = GATEIO_SPOT.parse_trade(&btc(), &frame).unwrap();
        assert_eq!(trade.id, "gateio-309143071");
        assert_eq!(trade.timestamp_ms, 1_606_292_218_213);
        assert_eq!(trade.taker_side, TakerSide::Sell);
    }

    #[test]
    fn test_parse_futures_signed_size() {
        let frame = json!({"channel": "futures.trades", "event": "update", "time": 1,
            "result": [{"size": -108, "id": 27753479, "create_time": 1545136464, "create_time_ms": 1545136464123u64,
                        "price": "96.4", "contract": "BTC_USDT"}]});
        let trade = GATEIO_FUTURES.parse_trade(&btc(), &frame).unwrap();
        assert_eq!(trade.quantity, "108");
        assert_eq!(trade.taker_side, TakerSide::Sell);
        assert_eq!(trade.id, "gateio-futures-27753479");
    }

    #[test]
    fn test_ignores_acks_and_pongs() {
        let ack = json!({"time": 1, "channel": "spot.trades", "event": "subscribe", "result": {"status": "success"}});
        assert!(GATEIO_SPOT.parse_trade(&btc(), &ack).is_none());
        let pong = json!({"time": 1, "channel": "spot.pong", "event": "", "result": null});
        assert!(GATEIO_SPOT.parse_trade(&btc(), &pong).is_none());
        assert_eq!(GATEIO_FUTURES.heartbeat().unwrap().frame, r#"{"channel":"futures.ping"}"#);
    }
}
