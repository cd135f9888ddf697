use serde::Serialize;

use crate::engine::types::BookLevel;

/// Latest full book published by one venue. Replaced wholesale on every
/// update, never patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderBookSnapshot {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBookSnapshot {
    pub fn new(bids: Vec<BookLevel>, asks: Vec<BookLevel>) -> Self {
        Self { bids, asks }
    }

    /// Keep at most `depth` levels per side, in the order the venue sent them.
    pub fn truncated(mut self, depth: usize) -> Self {
        self.bids.truncate(depth);
        self.asks.truncate(depth);
        self
    }

    pub fn bbo(&self) -> (Option<BookLevel>, Option<BookLevel>) {
        let best_bid = self
            .bids
            .iter()
            .copied()
            .max_by(|a, b| a.price.total_cmp(&b.price));
        let best_ask = self
            .asks
            .iter()
            .copied()
            .min_by(|a, b| a.price.total_cmp(&b.price));
        (best_bid, best_ask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbo_ignores_wire_order() {
        let snap = OrderBookSnapshot::new(
            vec![BookLevel::new(99.0, 1.0), BookLevel::new(100.0, 2.0)],
            vec![BookLevel::new(102.0, 1.0), BookLevel::new(101.0, 3.0)],
        );
        let (bid, ask) = snap.bbo();
        assert_eq!(bid, Some(BookLevel::new(100.0, 2.0)));
        assert_eq!(ask, Some(BookLevel::new(101.0, 3.0)));
        assert_eq!(OrderBookSnapshot::default().bbo(), (None, None));
    }

    #[test]
    fn test_truncated() {
        let levels: Vec<_> = (1..=20).map(|i| BookLevel::new(i as f64, 1.0)).collect();
        let snap = OrderBookSnapshot::new(levels.clone(), levels).truncated(10);
        assert_eq!(snap.bids.len(), 10);
        assert_eq!(snap.asks.len(), 10);
    }
}
