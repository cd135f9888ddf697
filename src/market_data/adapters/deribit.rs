// Deribit JSON-RPC over websocket. Only perpetuals are followed; the
// server-side heartbeat must be acknowledged or the session is closed.

use serde_json::{json, Value};

use super::{side_word, RawTrade, VenueAdapter};
use crate::engine::instrument::Instrument;
use crate::engine::types::{MarketType, Trade, VenueId};
use crate::market_data::normaliser;

const HEARTBEAT_INTERVAL_SECS: u64 = 30;

pub struct DeribitAdapter;

pub static DERIBIT: DeribitAdapter = DeribitAdapter;

impl DeribitAdapter {
    fn instrument_name(instrument: &Instrument) -> String {
        match instrument.quote() {
            "USDC" => format!("{}_USDC-PERPETUAL", instrument.base()),
            _ => format!("{}-PERPETUAL", instrument.base()),
        }
    }
}

impl VenueAdapter for DeribitAdapter {
    fn id(&self) -> VenueId {
        VenueId::Deribit
    }

    fn market_type(&self) -> MarketType {
        MarketType::Futures
    }

    fn display_name(&self) -> &'static str {
        "Deribit"
    }

    fn build_endpoint(&self, _instrument: &Instrument) -> Option<String> {
        Some("wss://www.deribit.com/ws/api/v2".to_string())
    }

    fn build_subscription(&self, instrument: &Instrument) -> Vec<Value> {
        let channel = format!("trades.{}.100ms", Self::instrument_name(instrument));
        vec![
            json!({"jsonrpc": "2.0", "id": 1, "method": "public/subscribe", "params": {"channels": [channel]}}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "public/set_heartbeat",
                   "params": {"interval": HEARTBEAT_INTERVAL_SECS}}),
        ]
    }

    fn parse_trade(&self, instrument: &Instrument, frame: &Value) -> Option<Trade> {
        if frame.get("method")?.as_str()? != "subscription" {
            return None;
        }
        let params = frame.get("params")?;
        if !params.get("channel")?.as_str()?.starts_with("trades.") {
            return None;
        }
        let trade = params.get("data")?.as_array()?.first()?;
        let raw = RawTrade {
            native_id: normaliser::id_string(trade.get("trade_id")?)?,
            price: normaliser::decimal_string(trade.get("price")?)?,
            quantity: normaliser::decimal_string(trade.get("amount")?)?,
            timestamp_ms: normaliser::epoch_ms(trade.get("timestamp")?)?,
            taker_side: side_word(trade.get("direction")?)?,
        };
        Some(raw.into_trade(self, instrument))
    }

    fn on_message(&self, frame: &Value) -> Option<String> {
        if frame.get("method")?.as_str()? != "heartbeat" {
            return None;
        }
        if frame.get("params")?.get("type")?.as_str()? != "test_request" {
            return None;
        }
        Some(json!({"jsonrpc": "2.0", "id": 3, "method": "public/test", "params": {}}).to_string())
    }
}
