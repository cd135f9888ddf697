use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::engine::types::{MarketType, TakerSide, Trade, VenueId};

/// Hard cap on retained trades.
pub const TAPE_CAPACITY: usize = 300;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SideFilter {
    #[default]
    All,
    Buy,
    Sell,
}

impl SideFilter {
    pub fn admits(&self, side: TakerSide) -> bool {
        match self {
            SideFilter::All => true,
            SideFilter::Buy => side == TakerSide::Buy,
            SideFilter::Sell => side == TakerSide::Sell,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MarketFilter {
    #[default]
    All,
    Spot,
    Futures,
}

impl MarketFilter {
    pub fn admits(&self, market: MarketType) -> bool {
        match self {
            MarketFilter::All => true,
            MarketFilter::Spot => market == MarketType::Spot,
            MarketFilter::Futures => market == MarketType::Futures,
        }
    }
}

/// Read-side predicate over trades. An empty venue set admits every venue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapeFilter {
    pub venues: Vec<VenueId>,
    pub side: SideFilter,
    pub market: MarketFilter,
    pub min_notional: f64,
}

impl TapeFilter {
    pub fn admits(&self, trade: &Trade) -> bool {
        self.admits_with_notional(trade, trade.notional())
    }

    /// Same as [`TapeFilter::admits`] when the caller already has the notional.
    pub fn admits_with_notional(&self, trade: &Trade, notional: f64) -> bool {
        (self.venues.is_empty() || self.venues.contains(&trade.venue))
            && self.side.admits(trade.taker_side)
            && self.market.admits(trade.market_type)
            && notional >= self.min_notional
    }
}

/// Newest-first ring of recent trades across every connected venue.
#[derive(Debug, Clone)]
pub struct Tape {
    trades: VecDeque<Trade>,
}

impl Default for Tape {
    fn default() -> Self {
        Self::new()
    }
}

impl Tape {
    pub fn new() -> Self {
        Self { trades: VecDeque::with_capacity(TAPE_CAPACITY) }
    }

    /// Insert at the head, evicting the oldest trades beyond capacity.
    pub fn push(&mut self, trade: Trade) {
        self.trades.push_front(trade);
        self.trades.truncate(TAPE_CAPACITY);
    }

    pub fn clear(&mut self) {
        self.trades.clear();
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter()
    }

    /// Owned copy of the trades the filter admits, newest first.
    pub fn filtered(&self, filter: &TapeFilter) -> Vec<Trade> {
        self.trades.iter().filter(|t| filter.admits(t)).cloned().collect()
    }
}

/// Summary figures over a set of trades.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TapeStats {
    pub buy_count: usize,
    pub sell_count: usize,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub total_volume: f64,
    /// Share of notional on the buy side; 50 when there is no volume.
    pub buy_percent: f64,
    pub largest: Option<Trade>,
    pub average_notional: f64,
}

impl TapeStats {
    pub fn compute<'a>(trades: impl IntoIterator<Item = &'a Trade>) -> Self {
        let mut stats = TapeStats::default();
        let mut largest_notional = f64::NEG_INFINITY;
        for trade in trades {
            let notional = trade.notional();
            match trade.taker_side {
                TakerSide::Buy => {
                    stats.buy_count += 1;
                    stats.buy_volume += notional;
                }
                TakerSide::Sell => {
                    stats.sell_count += 1;
                    stats.sell_volume += notional;
                }
            }
            if notional > largest_notional {
                largest_notional = notional;
                stats.largest = Some(trade.clone());
            }
        }
        stats.total_volume = stats.buy_volume + stats.sell_volume;
        stats.buy_percent = if stats.total_volume > 0.0 {
            stats.buy_volume / stats.total_volume * 100.0
        } else {
            50.0
        };
        let count = stats.buy_count + stats.sell_count;
        if count > 0 {
            stats.average_notional = stats.total_volume / count as f64;
        }
        stats
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    pub(crate) fn trade(id: u64, venue: VenueId, side: TakerSide, price: &str, qty: &str) -> Trade {
        let market_type = if VenueId::ALL.iter().position(|v| *v == venue).unwrap_or(0) < 10 {
            MarketType::Spot
        } else {
            MarketType::Futures
        };
        Trade {
            id: format!("{venue}-{id}"),
            price: price.to_string(),
            quantity: qty.to_string(),
            timestamp_ms: id as i64,
            taker_side: side,
            instrument: "BTCUSDT".to_string(),
            venue,
            market_type,
        }
    }

    #[test]
    fn test_push_is_newest_first() {
        let mut tape = Tape::new();
        tape.push(trade(1, VenueId::Binance, TakerSide::Buy, "1", "1"));
        tape.push(trade(2, VenueId::Okx, TakerSide::Sell, "1", "1"));
        let ids: Vec<_> = tape.iter().map(|t| t.timestamp_ms).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut tape = Tape::new();
        for i in 0..350 {
            tape.push(trade(i, VenueId::Bybit, TakerSide::Buy, "1", "1"));
        }
        assert_eq!(tape.len(), TAPE_CAPACITY);
        assert_eq!(tape.iter().next().unwrap().timestamp_ms, 349);
        assert_eq!(tape.iter().last().unwrap().timestamp_ms, 50);
    }

    #[test]
    fn test_min_notional_hides_but_keeps() {
        let mut tape = Tape::new();
        tape.push(trade(1, VenueId::Binance, TakerSide::Buy, "100", "0.5"));
        tape.push(trade(2, VenueId::Binance, TakerSide::Buy, "100", "2"));
        let filter = TapeFilter { min_notional: 100.0, ..TapeFilter::default() };
        let shown = tape.filtered(&filter);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].timestamp_ms, 2);
        assert_eq!(tape.len(), 2);
    }

    #[test]
    fn test_filter_dimensions() {
        let spot_buy = trade(1, VenueId::Coinbase, TakerSide::Buy, "10", "1");
        let perp_sell = trade(2, VenueId::Deribit, TakerSide::Sell, "10", "1");

        let venues = TapeFilter { venues: vec![VenueId::Deribit], ..TapeFilter::default() };
        assert!(!venues.admits(&spot_buy));
        assert!(venues.admits(&perp_sell));

        let sells = TapeFilter { side: SideFilter::Sell, ..TapeFilter::default() };
        assert!(!sells.admits(&spot_buy));
        assert!(sells.admits(&perp_sell));

        let spot = TapeFilter { market: MarketFilter::Spot, ..TapeFilter::default() };
        assert!(spot.admits(&spot_buy));
        assert!(!spot.admits(&perp_sell));
    }

    #[test]
    fn test_stats() {
        let trades = vec![
            trade(1, VenueId::Binance, TakerSide::Buy, "100", "3"),
            trade(2, VenueId::Okx, TakerSide::Sell, "100", "1"),
        ];
        let stats = TapeStats::compute(&trades);
        assert_eq!(stats.buy_count, 1);
        assert_eq!(stats.sell_count, 1);
        assert_eq!(stats.total_volume, 400.0);
        assert_eq!(stats.buy_percent, 75.0);
        assert_eq!(stats.average_notional, 200.0);
        assert_eq!(stats.largest.unwrap().timestamp_ms, 1);

        let empty = TapeStats::compute(&Vec::<Trade>::new());
        assert_eq!(empty.buy_percent, 50.0);
        assert_eq!(empty.average_notional, 0.0);
        assert!(empty.largest.is_none());
    }

    proptest! {
        #[test]
        fn prop_tape_is_capped_and_ordered(n in 0usize..700) {
            let mut tape = Tape::new();
            for i in 0..n {
                tape.push(trade(i as u64, VenueId::Kraken, TakerSide::Sell, "1", "1"));
            }
            prop_assert_eq!(tape.len(), n.min(TAPE_CAPACITY));
            let stamps: Vec<_> = tape.iter().map(|t| t.timestamp_ms).collect();
            prop_assert!(stamps.windows(2).all(|w| w[0] > w[1]));
        }

        #[test]
        fn prop_filter_never_mutates(qtys in prop::collection::vec(0.0f64..10.0, 0..50), min in 0.0f64..1_000.0) {
            let mut tape = Tape::new();
            for (i, q) in qtys.iter().enumerate() {
                tape.push(trade(i as u64, VenueId::Okx, TakerSide::Buy, "100", &q.to_string()));
            }
            let before = tape.len();
            let shown = tape.filtered(&TapeFilter { min_notional: min, ..TapeFilter::default() });
            prop_assert_eq!(tape.len(), before);
            prop_assert!(shown.len() <= before);
            prop_assert!(shown.iter().all(|t| t.notional() >= min));
        }
    }
}
