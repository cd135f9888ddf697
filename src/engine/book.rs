use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{instrument, trace};

use crate::engine::types::{BookLevel, MarketType, VenueId};
use crate::market_data::external_book::OrderBookSnapshot;
use crate::market_data::normaliser::{key_to_price, price_key};

/// Levels per side handed to readers. The full merge is kept internally.
pub const LADDER_DEPTH: usize = 12;

/// Which venues take part in the merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BookMarketFilter {
    #[default]
    Combined,
    Spot,
    Futures,
}

impl BookMarketFilter {
    pub fn admits(&self, market: MarketType) -> bool {
        match self {
            BookMarketFilter::Combined => true,
            BookMarketFilter::Spot => market == MarketType::Spot,
            BookMarketFilter::Futures => market == MarketType::Futures,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookMarketFilter::Combined => "combined",
            BookMarketFilter::Spot => "spot",
            BookMarketFilter::Futures => "futures",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "combined" | "all" => Some(BookMarketFilter::Combined),
            "spot" => Some(BookMarketFilter::Spot),
            "futures" | "perp" => Some(BookMarketFilter::Futures),
            _ => None,
        }
    }
}

/// One venue's share of an aggregated level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Contribution {
    pub venue: VenueId,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedLevel {
    /// Price in hundredths.
    pub price_key: i64,
    pub quantity: f64,
    /// Sum of unrounded price * quantity over contributors.
    pub notional: f64,
    pub contributors: SmallVec<[Contribution; 4]>,
}

impl AggregatedLevel {
    fn empty(price_key: i64) -> Self {
        Self { price_key, quantity: 0.0, notional: 0.0, contributors: SmallVec::new() }
    }

    pub fn price(&self) -> f64 {
        key_to_price(self.price_key)
    }

    fn absorb(&mut self, venue: VenueId, level: &BookLevel) {
        self.quantity += level.quantity;
        self.notional += level.price * level.quantity;
        self.contributors.push(Contribution { venue, quantity: level.quantity });
    }
}

/// Owned copy of the exposed ladder.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LadderView {
    pub bids: Vec<AggregatedLevel>,
    pub asks: Vec<AggregatedLevel>,
    pub spread_percent: f64,
    /// Largest level notional across both exposed sides, never below 1.
    /// Used to scale depth bars.
    pub max_notional: f64,
}

#[derive(Debug, Clone)]
struct VenueBook {
    market: MarketType,
    snapshot: OrderBookSnapshot,
}

/// Cross-venue ladder. Each venue contributes its latest full snapshot;
/// every change rebuilds the merge from scratch.
#[derive(Debug, Default)]
pub struct BookAggregator {
    // BTreeMap so the merge always walks venues in id order, whatever the
    // arrival order was.
    books: BTreeMap<VenueId, VenueBook>,
    filter: BookMarketFilter,
    bids: Vec<AggregatedLevel>,
    asks: Vec<AggregatedLevel>,
}

impl BookAggregator {
    pub fn new(filter: BookMarketFilter) -> Self {
        Self { filter, ..Self::default() }
    }

    pub fn filter(&self) -> BookMarketFilter {
        self.filter
    }

    /// Replace `venue`'s snapshot and rebuild.
    #[instrument(level = "trace", skip(self, snapshot), fields(bids = snapshot.bids.len(), asks = snapshot.asks.len()))]
    pub fn apply(&mut self, venue: VenueId, market: MarketType, snapshot: OrderBookSnapshot) {
        self.books.insert(venue, VenueBook { market, snapshot });
        self.recompute();
    }

    /// Drop a venue's contribution, e.g. after it disconnects.
    pub fn remove(&mut self, venue: VenueId) {
        if self.books.remove(&venue).is_some() {
            self.recompute();
        }
    }

    pub fn clear(&mut self) {
        self.books.clear();
        self.bids.clear();
        self.asks.clear();
    }

    pub fn set_filter(&mut self, filter: BookMarketFilter) {
        if self.filter != filter {
            self.filter = filter;
            self.recompute();
        }
    }

    /// Venues currently holding a snapshot, filtered or not.
    #[cfg(test)]
    fn venues(&self) -> impl Iterator<Item = VenueId> + '_ {
        self.books.keys().copied()
    }

    /// Full merged bid side, best first.
    pub fn bids(&self) -> &[AggregatedLevel] {
        &self.bids
    }

    /// Full merged ask side, best first.
    pub fn asks(&self) -> &[AggregatedLevel] {
        &self.asks
    }

    /// (best ask - best bid) / best ask, in percent. Zero when a side is empty.
    pub fn spread_percent(&self) -> f64 {
        match (self.bids.first(), self.asks.first()) {
            (Some(bid), Some(ask)) => {
                let ask_price = ask.price();
                if ask_price > 0.0 {
                    (ask_price - bid.price()) / ask_price * 100.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    pub fn view(&self) -> LadderView {
        let bids: Vec<_> = self.bids.iter().take(LADDER_DEPTH).cloned().collect();
        let asks: Vec<_> = self.asks.iter().take(LADDER_DEPTH).cloned().collect();
        let max_notional = bids
            .iter()
            .chain(asks.iter())
            .map(|level| level.notional)
            .fold(1.0_f64, f64::max);
        LadderView { spread_percent: self.spread_percent(), max_notional, bids, asks }
    }

    fn recompute(&mut self) {
        let mut bids: BTreeMap<i64, AggregatedLevel> = BTreeMap::new();
        let mut asks: BTreeMap<i64, AggregatedLevel> = BTreeMap::new();

        for (venue, book) in &self.books {
            if !self.filter.admits(book.market) {
                continue;
            }
            merge_side(&mut bids, *venue, &book.snapshot.bids);
            merge_side(&mut asks, *venue, &book.snapshot.asks);
        }

        self.bids = bids.into_values().rev().collect();
        self.asks = asks.into_values().collect();
        trace!(bids = self.bids.len(), asks = self.asks.len(), "ladder rebuilt");
    }
}

fn merge_side(side: &mut BTreeMap<i64, AggregatedLevel>, venue: VenueId, levels: &[BookLevel]) {
    for level in levels {
        if level.quantity.is_nan() || level.quantity <= 0.0 {
            continue;
        }
        let Some(key) = price_key(level.price) else { continue };
        side.entry(key).or_insert_with(|| AggregatedLevel::empty(key)).absorb(venue, level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snap(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> OrderBookSnapshot {
        OrderBookSnapshot::new(
            bids.iter().map(|(p, q)| BookLevel::new(*p, *q)).collect(),
            asks.iter().map(|(p, q)| BookLevel::new(*p, *q)).collect(),
        )
    }

    #[test]
    fn test_empty_aggregator() {
        let agg = BookAggregator::new(BookMarketFilter::Combined);
        let view = agg.view();
        assert!(view.bids.is_empty());
        assert!(view.asks.is_empty());
        assert_eq!(view.spread_percent, 0.0);
        assert_eq!(view.max_notional, 1.0);
    }

    #[test]
    fn test_rounding_merges_venues() {
        let mut agg = BookAggregator::default();
        agg.apply(VenueId::Binance, MarketType::Spot, snap(&[(100.004, 1.0)], &[]));
        agg.apply(VenueId::Okx, MarketType::Spot, snap(&[(100.001, 2.0)], &[]));

        let level = &agg.bids()[0];
        assert_eq!(level.price_key, 10_000);
        assert_eq!(level.quantity, 3.0);
        assert!((level.notional - (100.004 + 200.002)).abs() < 1e-9);
        let venues: Vec<_> = level.contributors.iter().map(|c| c.venue).collect();
        assert_eq!(venues, vec![VenueId::Binance, VenueId::Okx]);
    }

    #[test]
    fn test_spread_percent() {
        let mut agg = BookAggregator::default();
        agg.apply(VenueId::Bybit, MarketType::Spot, snap(&[(100.0, 1.0)], &[(101.0, 1.0)]));
        assert!((agg.spread_percent() - 0.990099).abs() < 1e-4);

        agg.apply(VenueId::Bybit, MarketType::Spot, snap(&[(100.0, 1.0)], &[]));
        assert_eq!(agg.spread_percent(), 0.0);
    }

    #[test]
    fn test_sort_order_and_depth_cap() {
        let mut agg = BookAggregator::default();
        let bids: Vec<_> = (0..20).map(|i| (100.0 - i as f64, 1.0)).collect();
        let asks: Vec<_> = (0..20).map(|i| (120.0 - i as f64, 1.0)).collect();
        agg.apply(VenueId::Kraken, MarketType::Spot, snap(&bids, &asks));

        assert_eq!(agg.bids().len(), 20);
        let view = agg.view();
        assert_eq!(view.bids.len(), LADDER_DEPTH);
        assert_eq!(view.asks.len(), LADDER_DEPTH);
        assert_eq!(view.bids[0].price_key, 10_000);
        assert_eq!(view.asks[0].price_key, 10_100);
        assert!(view.bids.windows(2).all(|w| w[0].price_key > w[1].price_key));
        assert!(view.asks.windows(2).all(|w| w[0].price_key < w[1].price_key));
        assert!((view.max_notional - 112.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_replaces_previous_contribution() {
        let mut agg = BookAggregator::default();
        agg.apply(VenueId::Binance, MarketType::Spot, snap(&[(50.0, 5.0)], &[]));
        agg.apply(VenueId::Binance, MarketType::Spot, snap(&[(49.0, 1.0)], &[]));
        assert_eq!(agg.bids().len(), 1);
        assert_eq!(agg.bids()[0].price_key, 4_900);
    }

    #[test]
    fn test_market_filter_excludes_venues() {
        let mut agg = BookAggregator::default();
        agg.apply(VenueId::Binance, MarketType::Spot, snap(&[(10.0, 1.0)], &[]));
        agg.apply(VenueId::BinanceFutures, MarketType::Futures, snap(&[(10.0, 2.0)], &[]));
        assert_eq!(agg.bids()[0].quantity, 3.0);

        agg.set_filter(BookMarketFilter::Futures);
        assert_eq!(agg.bids()[0].quantity, 2.0);
        assert_eq!(agg.bids()[0].contributors.len(), 1);
        assert_eq!(agg.bids()[0].contributors[0].venue, VenueId::BinanceFutures);

        agg.set_filter(BookMarketFilter::Spot);
        assert_eq!(agg.bids()[0].contributors[0].venue, VenueId::Binance);
        // filtered venues still hold their snapshot
        assert_eq!(agg.venues().count(), 2);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut agg = BookAggregator::default();
        agg.apply(VenueId::Okx, MarketType::Spot, snap(&[(1.0, 1.0)], &[(2.0, 1.0)]));
        agg.apply(VenueId::Coinbase, MarketType::Spot, snap(&[(1.5, 1.0)], &[]));
        agg.remove(VenueId::Coinbase);
        assert_eq!(agg.bids()[0].price_key, 100);
        agg.clear();
        assert_eq!(agg.view(), LadderView { max_notional: 1.0, ..LadderView::default() });
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!(BookMarketFilter::parse("Spot"), Some(BookMarketFilter::Spot));
        assert_eq!(BookMarketFilter::parse("perp"), Some(BookMarketFilter::Futures));
        assert_eq!(BookMarketFilter::parse("x"), None);
    }

    fn arb_levels() -> impl Strategy<Value = Vec<(f64, f64)>> {
        prop::collection::vec((1.0f64..1_000.0, 0.001f64..50.0), 0..15)
    }

    fn arb_books() -> impl Strategy<Value = BTreeMap<VenueId, (Vec<(f64, f64)>, Vec<(f64, f64)>)>> {
        prop::collection::btree_map(
            prop::sample::select(VenueId::ALL.to_vec()),
            (arb_levels(), arb_levels()),
            0..8,
        )
    }

    fn market_of(venue: VenueId) -> MarketType {
        if VenueId::ALL.iter().position(|v| *v == venue).unwrap_or(0) < 10 {
            MarketType::Spot
        } else {
            MarketType::Futures
        }
    }

    proptest! {
        #[test]
        fn prop_merge_is_order_independent(books in arb_books(), seed in any::<u64>()) {
            let entries: Vec<_> = books.into_iter().collect();
            let mut shuffled = entries.clone();
            // deterministic rotation + reversal from the seed
            if !shuffled.is_empty() {
                let k = (seed as usize) % shuffled.len();
                shuffled.rotate_left(k);
            }
            if seed % 2 == 0 {
                shuffled.reverse();
            }

            let mut forward = BookAggregator::default();
            for (venue, (bids, asks)) in &entries {
                forward.apply(*venue, market_of(*venue), snap(bids, asks));
            }
            let mut other = BookAggregator::default();
            for (venue, (bids, asks)) in &shuffled {
                other.apply(*venue, market_of(*venue), snap(bids, asks));
            }
            prop_assert_eq!(forward.view(), other.view());
            prop_assert_eq!(forward.bids(), other.bids());
        }

        #[test]
        fn prop_quantity_is_conserved(books in arb_books()) {
            let mut agg = BookAggregator::default();
            let mut expected = 0.0;
            for (venue, (bids, asks)) in &books {
                expected += bids.iter().map(|(_, q)| q).sum::<f64>();
                agg.apply(*venue, market_of(*venue), snap(bids, asks));
            }
            let merged: f64 = agg.bids().iter().map(|l| l.quantity).sum();
            prop_assert!((merged - expected).abs() < 1e-6 * expected.max(1.0));
        }
    }
}
