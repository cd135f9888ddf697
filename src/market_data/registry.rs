// Static catalogue of every venue descriptor, looked up by id.

use crate::engine::types::{MarketType, VenueId};
use crate::market_data::adapters::binance::{BINANCE_FUTURES, BINANCE_SPOT};
use crate::market_data::adapters::bitfinex::{BITFINEX_PERP, BITFINEX_SPOT};
use crate::market_data::adapters::bybit::{BYBIT_PERP, BYBIT_SPOT};
use crate::market_data::adapters::coinbase::COINBASE;
use crate::market_data::adapters::deribit::DERIBIT;
use crate::market_data::adapters::gateio::{GATEIO_FUTURES, GATEIO_SPOT};
use crate::market_data::adapters::huobi::{HTX_FUTURES, HTX_SPOT};
use crate::market_data::adapters::kraken::KRAKEN;
use crate::market_data::adapters::kucoin::{KUCOIN_FUTURES, KUCOIN_SPOT};
use crate::market_data::adapters::mexc::{MEXC_FUTURES, MEXC_SPOT};
use crate::market_data::adapters::okx::{OKX_SPOT, OKX_SWAP};
use crate::market_data::adapters::VenueAdapter;

/// Read-only registry. Holds no state; every lookup resolves to a static
/// descriptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct VenueRegistry;

impl VenueRegistry {
    pub fn get(&self, venue: VenueId) -> &'static dyn VenueAdapter {
        match venue {
            VenueId::Binance => &BINANCE_SPOT,
            VenueId::Coinbase => &COINBASE,
            VenueId::Kraken => &KRAKEN,
            VenueId::Okx => &OKX_SPOT,
            VenueId::Bybit => &BYBIT_SPOT,
            VenueId::Kucoin => &KUCOIN_SPOT,
            VenueId::Bitfinex => &BITFINEX_SPOT,
            VenueId::Huobi => &HTX_SPOT,
            VenueId::Mexc => &MEXC_SPOT,
            VenueId::Gateio => &GATEIO_SPOT,
            VenueId::BinanceFutures => &BINANCE_FUTURES,
            VenueId::BybitPerp => &BYBIT_PERP,
            VenueId::OkxSwap => &OKX_SWAP,
            VenueId::BitfinexPerp => &BITFINEX_PERP,
            VenueId::KucoinFutures => &KUCOIN_FUTURES,
            VenueId::HuobiFutures => &HTX_FUTURES,
            VenueId::Deribit => &DERIBIT,
            VenueId::MexcFutures => &MEXC_FUTURES,
            VenueId::GateioFutures => &GATEIO_FUTURES,
        }
    }

    /// All descriptors in `VenueId::ALL` order.
    pub fn iter(&self) -> impl Iterator<Item = &'static dyn VenueAdapter> + '_ {
        VenueId::ALL.iter().map(move |id| self.get(*id))
    }

    pub fn by_market(&self, market: MarketType) -> impl Iterator<Item = &'static dyn VenueAdapter> + '_ {
        self.iter().filter(move |adapter| adapter.market_type() == market)
    }
}
