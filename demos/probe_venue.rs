// Opens a single venue connection and prints every update its descriptor
// recognises. Useful when a venue changes its wire format.
// Run with: cargo run --example probe_venue -- okx-swap SOLUSDT

use std::time::Duration;

use clap::Parser;
use tapex_rs::engine::instrument::Instrument;
use tapex_rs::engine::types::VenueId;
use tapex_rs::market_data::adapters::VenueUpdate;
use tapex_rs::market_data::router::{
    ConnectionEvent, ConnectionManager, ConnectionPhase, ConnectionSettings, Selection, TungsteniteConnector,
};
use tapex_rs::telemetry;

#[derive(Parser)]
struct Args {
    #[clap(value_enum)]
    venue: VenueId,

    #[clap(default_value = "BTCUSDT")]
    instrument: String,

    /// Stop after this many updates
    #[clap(long, default_value = "20")]
    count: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("debug");
    let args = Args::parse();
    let instrument = Instrument::from_symbol(&args.instrument)?;

    let (mut manager, mut events) = ConnectionManager::new(TungsteniteConnector, ConnectionSettings::default());
    manager.select(Selection::new(instrument.clone(), [args.venue]));
    if manager.phase(args.venue) != Some(ConnectionPhase::Connecting) {
        println!("{} cannot serve {}", args.venue, instrument);
        return Ok(());
    }

    let mut seen = 0;
    while seen < args.count {
        let Ok(Some(routed)) = tokio::time::timeout(Duration::from_secs(30), events.recv()).await else {
            println!("no event within 30s (inert venue or quiet market)");
            break;
        };
        let Some((venue, event)) = manager.accept(routed) else { continue };
        match event {
            ConnectionEvent::Opened => println!("{venue}: connected"),
            ConnectionEvent::Update(VenueUpdate::Trade(trade)) => {
                seen += 1;
                println!("trade {} {} {} @ {} t={}", trade.id, trade.taker_side, trade.quantity, trade.price, trade.timestamp_ms);
            }
            ConnectionEvent::Update(VenueUpdate::Book(book)) => {
                seen += 1;
                let (bid, ask) = book.bbo();
                println!("book {} bids / {} asks, bbo {:?} / {:?}", book.bids.len(), book.asks.len(), bid, ask);
            }
            ConnectionEvent::Closed(reason) => {
                println!("{venue}: closed {reason:?}");
                break;
            }
        }
    }

    manager.close_all();
    Ok(())
}
