// MEXC spot (v3 deals) and contract (push.deal) streams.

use serde_json::{json, Value};

use super::{first_or_self, side_code, Heartbeat, RawTrade, VenueAdapter};
use crate::engine::instrument::Instrument;
use crate::engine::types::{MarketType, TakerSide, Trade, VenueId};
use crate::market_data::normaliser;

pub struct MexcSpotAdapter;
pub struct MexcFuturesAdapter;

pub static MEXC_SPOT: MexcSpotAdapter = MexcSpotAdapter;
pub static MEXC_FUTURES: MexcFuturesAdapter = MexcFuturesAdapter;

// Deals carry no id of their own. Fills of one sweep share time and price,
// so size and side go into the key as well.
fn deal_id(timestamp_ms: i64, price: &str, quantity: &str, side: TakerSide) -> String {
    format!("{timestamp_ms}-{price}-{quantity}-{side}")
}

impl VenueAdapter for MexcSpotAdapter {
    fn id(&self) -> VenueId {
        VenueId::Mexc
    }

    fn market_type(&self) -> MarketType {
        MarketType::Spot
    }

    fn display_name(&self) -> &'static str {
        "MEXC"
    }

    fn build_endpoint(&self, _instrument: &Instrument) -> Option<String> {
        Some("wss://wbs.mexc.com/ws".to_string())
    }

    fn build_subscription(&self, instrument: &Instrument) -> Vec<Value> {
        vec![json!({
            "method": "SUBSCRIPTION",
            "params": [format!("spot@public.deals.v3.api@{}", instrument.symbol())],
        })]
    }

    // {"c": "spot@public.deals.v3.api@BTCUSDT", "d": {"deals": [{"p", "v", "S", "t"}]}}
    fn parse_trade(&self, instrument: &Instrument, frame: &Value) -> Option<Trade> {
        let deal = frame.get("d")?.get("deals")?.as_array()?.first()?;
        let timestamp_ms = normaliser::epoch_ms(deal.get("t")?)?;
        let price = normaliser::decimal_string(deal.get("p")?)?;
        let quantity = normaliser::decimal_string(deal.get("v")?)?;
        let taker_side = side_code(deal.get("S")?)?;
        let raw = RawTrade {
            native_id: deal_id(timestamp_ms, &price, &quantity, taker_side),
            quantity,
            taker_side,
            timestamp_ms,
            price,
        };
        Some(raw.into_trade(self, instrument))
    }

    fn heartbeat(&self) -> Option<Heartbeat> {
        Some(Heartbeat::new(20, r#"{"method":"PING"}"#))
    }
}

impl VenueAdapter for MexcFuturesAdapter {
    fn id(&self) -> VenueId {
        VenueId::MexcFutures
    }

    fn market_type(&self) -> MarketType {
        MarketType::Futures
    }

    fn display_name(&self) -> &'static str {
        "MEXC Futures"
    }

    fn build_endpoint(&self, _instrument: &Instrument) -> Option<String> {
        Some("wss://contract.mexc.com/ws".to_string())
    }

    fn build_subscription(&self, instrument: &Instrument) -> Vec<Value> {
        vec![json!({"method": "sub.deal", "param": {"symbol": instrument.joined("_")}})]
    }

    fn parse_trade(&self, instrument: &Instrument, frame: &Value) -> Option<Trade> {
        if frame.get("channel")?.as_str()? != "push.deal" {
            return None;
        }
        let deal = first_or_self(frame.get("data")?)?;
        let timestamp_ms = normaliser::epoch_ms(deal.get("t")?)?;
        let price = normaliser::decimal_string(deal.get("p")?)?;
        let quantity = normaliser::decimal_string(deal.get("v")?)?;
        let taker_side = side_code(deal.get("T")?)?;
        let raw = RawTrade {
            native_id: deal_id(timestamp_ms, &price, &quantity, taker_side),
            quantity,
            taker_side,
            timestamp_ms,
            price,
        };
        Some(raw.into_trade(self, instrument))
    }

    fn heartbeat(&self) -> Option<Heartbeat> {
        Some(Heartbeat::new(20, r#"{"method":"ping"}"#))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn btc() -> Instrument {
        Instrument::from_symbol("BTCUSDT").unwrap()
    }

    #[test]
    fn test_subscriptions() {
        assert_eq!(
            MEXC_SPOT.build_subscription(&btc())[0]["params"],
            json!(["spot@public.deals.v3.api@BTCUSDT"])
        );
        assert_eq!(MEXC_FUTURES.build_subscription(&btc())[0]["param"]["symbol"], "BTC_USDT");
    }

    #[test]
    fn test_parse_spot_deal() {
        let frame = json!({"c": "spot@public.deals.v3.api@BTCUSDT", "s": "BTCUSDT", "t": 1,
            "d": {"e": "spot@public.deals.v3.api", "deals": [{"S": 2, "p": "20233.84", "t": 1678345223056u64, "v": "0.001028"}]}});
        let trade = MEXC_SPOT.parse_trade(&btc(), &frame).unwrap();
        assert_eq!(trade.taker_side, TakerSide::Sell);
        assert_eq!(trade.id, "mexc-1678345223056-20233.84-0.001028-sell");
        assert_eq!(trade.quantity, "0.001028");
    }

    #[test]
    fn test_same_time_and_price_deals_get_distinct_ids() {
        let deal = |v: &str, side: u8| {
            json!({"c": "spot@public.deals.v3.api@BTCUSDT",
                "d": {"deals": [{"t": 1678345223056u64, "p": "20233.84", "v": v, "S": side}]}})
        };
        let small = MEXC_SPOT.parse_trade(&btc(), &deal("0.01", 1)).unwrap();
        let large = MEXC_SPOT.parse_trade(&btc(), &deal("0.50", 1)).unwrap();
        let opposite = MEXC_SPOT.parse_trade(&btc(), &deal("0.01", 2)).unwrap();
        assert_ne!(small.id, large.id);
        assert_ne!(small.id, opposite.id);

        let contract = |v: u32| json!({"channel": "push.deal", "data": {"T": 1, "p": 27000.5, "t": 1587442022003u64, "v": v}});
        let a = MEXC_FUTURES.parse_trade(&btc(), &contract(2)).unwrap();
        let b = MEXC_FUTURES.parse_trade(&btc(), &contract(3)).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.id, "mexc-futures-1587442022003-27000.5-2-buy");
    }

    #[test]
    fn test_parse_contract_deal_object_or_array() {
        let object = json!({"channel": "push.deal", "symbol": "BTC_USDT",
            "data": {"M": 1, "O": 1, "T": 1, "p": 27000.5, "t": 1587442022003u64, "v": 2}});
        let trade = MEXC_FUTURES.parse_trade(&btc(), &object).unwrap();
        assert_eq!(trade.taker_side, TakerSide::Buy);
        assert_eq!(trade.price, "27000.5");

        let array = json!({"channel": "push.deal", "data": [{"T": 2, "p": 1, "t": 2, "v": 3}]});
        assert_eq!(MEXC_FUTURES.parse_trade(&btc(), &array).unwrap().taker_side, TakerSide::Sell);
    }

    #[test]
    fn test_ignores_pong_and_acks() {
        assert!(MEXC_FUTURES.parse_trade(&btc(), &json!({"channel": "pong", "data": 1})).is_none());
        assert!(MEXC_SPOT.parse_trade(&btc(), &json!({"id": 0, "code": 0, "msg": "PONG"})).is_none());
    }
}
