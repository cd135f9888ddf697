// KuCoin hands out websocket endpoints only through a REST token handshake,
// which this engine does not perform. Both descriptors can be selected but
// never connect.

use serde_json::Value;

use super::VenueAdapter;
use crate::engine::instrument::Instrument;
use crate::engine::types::{MarketType, Trade, VenueId};

pub struct KucoinAdapter {
    pub venue: VenueId,
    pub market: MarketType,
    pub name: &'static str,
}

pub static KUCOIN_SPOT: KucoinAdapter = KucoinAdapter {
    venue: VenueId::Kucoin,
    market: MarketType::Spot,
    name: "KuCoin",
};

pub static KUCOIN_FUTURES: KucoinAdapter = KucoinAdapter {
    venue: VenueId::KucoinFutures,
    market: MarketType::Futures,
    name: "KuCoin Futures",
};

impl VenueAdapter for KucoinAdapter {
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
        None
    }

    fn parse_trade(&self, _instrument: &Instrument, _frame: &Value) -> Option<Trade> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kucoin_is_inert() {
        let btc = Instrument::from_symbol("BTCUSDT").unwrap();
        for adapter in [&KUCOIN_SPOT, &KUCOIN_FUTURES] {
            assert!(adapter.build_endpoint(&btc).is_none());
            assert!(adapter.build_subscription(&btc).is_empty());
            let frame = json!({"type": "message", "topic": "/market/match:BTC-USDT",
                "data": {"price": "1", "size": "1", "side": "buy", "tradeId": "1", "time": "1"}});
            assert!(adapter.parse_trade(&btc, &frame).is_none());
        }
    }
}
