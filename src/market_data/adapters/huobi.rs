// HTX (Huobi) spot and USDT-margined swaps. Both hosts send gzip binary
// frames and expect every `{"ping": n}` to be answered with `{"pong": n}`.

use serde_json::{json, Value};

use super::{side_word, RawTrade, VenueAdapter};
use crate::engine::instrument::Instrument;
use crate::engine::types::{MarketType, Trade, VenueId};
use crate::market_data::normaliser;

pub struct HuobiAdapter {
    pub venue: VenueId,
    pub market: MarketType,
    pub name: &'static str,
    pub url: &'static str,
}

pub static HTX_SPOT: HuobiAdapter = HuobiAdapter {
    venue: VenueId::Huobi,
    market: MarketType::Spot,
    name: "HTX",
    url: "wss://api.huobi.pro/ws",
};

pub static HTX_FUTURES: HuobiAdapter = HuobiAdapter {
    venue: VenueId::HuobiFutures,
    market: MarketType::Futures,
    name: "HTX Futures",
    url: "wss://api.hbdm.com/linear-swap-ws",
};

impl HuobiAdapter {
    fn channel(&self, instrument: &Instrument) -> String {
        let contract = match self.market {
            MarketType::Spot => instrument.lower(),
            MarketType::Futures => instrument.joined("-"),
        };
        format!("market.{contract}.trade.detail")
    }
}

impl VenueAdapter for HuobiAdapter {
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
        vec![json!({"sub": self.channel(instrument), "id": "trade"})]
    }

    fn parse_trade(&self, instrument: &Instrument, frame: &Value) -> Option<Trade> {
        if !frame.get("ch")?.as_str()?.ends_with(".trade.detail") {
            return None;
        }
        let trade = frame.get("tick")?.get("data")?.as_array()?.first()?;
        let native_id = match self.market {
            MarketType::Spot => trade.get("tradeId")?,
            MarketType::Futures => trade.get("id")?,
        };
        // swaps report contracts in `amount` and base units in `quantity`
        let quantity = match self.market {
            MarketType::Futures => trade.get("quantity").or_else(|| trade.get("amount"))?,
            MarketType::Spot => trade.get("amount")?,
        };
        let raw = RawTrade {
            native_id: normaliser::id_string(native_id)?,
            price: normaliser::decimal_string(trade.get("price")?)?,
            quantity: normaliser::decimal_string(quantity)?,
            timestamp_ms: normaliser::epoch_ms(trade.get("ts")?)?,
            taker_side: side_word(trade.get("direction")?)?,
        };
        Some(raw.into_trade(self, instrument))
    }

    fn on_message(&self, frame: &Value) -> Option<String> {
        let ping = frame.get("ping")?;
        ping.is_number().then(|| json!({"pong": ping}).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::TakerSide;

    fn btc() -> Instrument {
        Instrument::from_symbol("BTCUSDT").unwrap()
    }

    #[test]
    fn test_subscription_channels() {
        assert_eq!(HTX_SPOT.build_subscription(&btc())[0]["sub"], "market.btcusdt.trade.detail");
        assert_eq!(HTX_FUTURES.build_subscription(&btc())[0]["sub"], "market.BTC-USDT.trade.detail");
    }

    #[test]
    fn test_parse_spot_trade() {
        let frame = json!({"ch": "market.btcusdt.trade.detail", "ts": 1630994963175u64,
            "tick": {"id": 137005445109u64, "ts": 1630994963173u64, "data": [
                {"id": 1, "ts": 1630994963173u64, "tradeId": 102523573486u64, "amount": 0.006754,
                 "price": 52648.62, "direction": "buy"}]}});
        let trade = HTX_SPOT.parse_trade(&btc(), &frame).unwrap();
        assert_eq!(trade.id, "huobi-102523573486");
        assert_eq!(trade.price, "52648.62");
        assert_eq!(trade.quantity, "0.006754");
        assert_eq!(trade.taker_side, TakerSide::Buy);
    }

    #[test]
    fn test_parse_swap_prefers_quantity() {
        let frame = json!({"ch": "market.BTC-USDT.trade.detail", "ts": 1,
            "tick": {"id": 1, "ts": 1, "data": [
                {"id": 1313, "ts": 1603695505000u64, "amount": 20, "quantity": 0.02,
                 "price": 13100.5, "direction": "sell"}]}});
        let trade = HTX_FUTURES.parse_trade(&btc(), &frame).unwrap();
        assert_eq!(trade.id, "huobi-futures-1313");
        assert_eq!(trade.quantity, "0.02");
        assert_eq!(trade.taker_side, TakerSide::Sell);
    }

    #[test]
    fn test_answers_ping() {
        let reply = HTX_SPOT.on_message(&json!({"ping": 1492420473027u64})).unwrap();
        assert_eq!(reply, r#"{"pong":1492420473027}"#);
        assert!(HTX_SPOT.on_message(&json!({"status": "ok"})).is_none());
        assert!(HTX_SPOT.parse_trade(&btc(), &json!({"ping": 1})).is_none());
    }
}
