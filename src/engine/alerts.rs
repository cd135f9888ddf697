use serde::{Deserialize, Serialize};

use crate::engine::tape::TapeFilter;
use crate::engine::types::Trade;

/// Trades at or below this value never reach the alert predicate.
pub const ALERT_PRE_GATE: f64 = 50.0;

/// Decides which accepted trades are forwarded to the alert consumer.
/// Independent of whatever filter the tape is being read through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertPolicy {
    pub enabled: bool,
    pub min_notional: f64,
    pub filter: TapeFilter,
    pub whale_alerts: bool,
    pub whale_threshold: f64,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            min_notional: 100.0,
            filter: TapeFilter::default(),
            whale_alerts: true,
            whale_threshold: 50_000.0,
        }
    }
}

/// Emitted for every trade the alert policy lets through.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeNotification {
    pub trade: Trade,
    pub notional: f64,
    pub whale: bool,
}

impl AlertPolicy {
    pub fn evaluate(&self, trade: &Trade) -> Option<TradeNotification> {
        let notional = trade.notional();
        if !self.enabled || notional <= ALERT_PRE_GATE || notional < self.min_notional {
            return None;
        }
        if !self.filter.admits_with_notional(trade, notional) {
            return None;
        }
        Some(TradeNotification {
            trade: trade.clone(),
            notional,
            whale: self.whale_alerts && notional > self.whale_threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tape::tests::trade;
    use crate::engine::tape::SideFilter;
    use crate::engine::types::{TakerSide, VenueId};

    #[test]
    fn test_default_thresholds() {
        let policy = AlertPolicy::default();
        assert!(policy.evaluate(&trade(1, VenueId::Binance, TakerSide::Buy, "10", "5")).is_none());
        assert!(policy.evaluate(&trade(2, VenueId::Binance, TakerSide::Buy, "10", "9.99")).is_none());

        let hit = policy.evaluate(&trade(3, VenueId::Binance, TakerSide::Buy, "10", "10")).unwrap();
        assert_eq!(hit.notional, 100.0);
        assert!(!hit.whale);

        let whale = policy.evaluate(&trade(4, VenueId::Okx, TakerSide::Sell, "60000", "1")).unwrap();
        assert!(whale.whale);
    }

    #[test]
    fn test_pre_gate_applies_below_min() {
        let policy = AlertPolicy { min_notional: 0.0, ..AlertPolicy::default() };
        assert!(policy.evaluate(&trade(1, VenueId::Bybit, TakerSide::Buy, "50", "1")).is_none());
        assert!(policy.evaluate(&trade(2, VenueId::Bybit, TakerSide::Buy, "51", "1")).is_some());
    }

    #[test]
    fn test_own_filter_and_switches() {
        let sells_only = AlertPolicy {
            filter: TapeFilter { side: SideFilter::Sell, ..TapeFilter::default() },
            ..AlertPolicy::default()
        };
        assert!(sells_only.evaluate(&trade(1, VenueId::Kraken, TakerSide::Buy, "1000", "1")).is_none());
        assert!(sells_only.evaluate(&trade(2, VenueId::Kraken, TakerSide::Sell, "1000", "1")).is_some());

        let muted = AlertPolicy { enabled: false, ..AlertPolicy::default() };
        assert!(muted.evaluate(&trade(3, VenueId::Kraken, TakerSide::Sell, "1000", "1")).is_none());

        let no_whales = AlertPolicy { whale_alerts: false, ..AlertPolicy::default() };
        assert!(!no_whales.evaluate(&trade(4, VenueId::Kraken, TakerSide::Sell, "100000", "1")).unwrap().whale);
    }
}
