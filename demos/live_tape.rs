// Streams the merged tape for a few seconds and prints the final ladder.
// Run with: cargo run --example live_tape -- ETHUSDT 20

use std::time::Duration;

use tapex_rs::config::AppConfig;
use tapex_rs::engine::instrument::Instrument;
use tapex_rs::market_data::router::TungsteniteConnector;
use tapex_rs::market_data::unified_book::{Command, UnifiedBook};
use tapex_rs::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("info");

    let mut args = std::env::args().skip(1);
    let symbol = args.next().unwrap_or_else(|| "BTCUSDT".to_string());
    let seconds: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(15);

    let mut settings = AppConfig::default().core_settings()?;
    settings.instrument = Instrument::from_symbol(&symbol)?;

    println!("Live tape for {} across {} venues ({seconds}s)", settings.instrument.label(), settings.venues.len());
    let (core, handle, mut alerts) = UnifiedBook::new(TungsteniteConnector, settings);
    let task = tokio::spawn(core.run());

    let mut views = handle.subscribe();
    let mut last_seen = String::new();
    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            Some(note) = alerts.recv() => {
                println!("  >> {} alert: ${:.0} on {}", if note.whale { "whale" } else { "trade" }, note.notional, note.trade.venue);
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                // print only trades newer than the last one shown
                for trade in view.trades.iter().take_while(|t| t.id != last_seen).collect::<Vec<_>>().into_iter().rev() {
                    println!("{:>16} {:<4} {:>12} x {:<12}", trade.venue.as_str(), trade.taker_side.to_string(), trade.price, trade.quantity);
                }
                if let Some(newest) = view.trades.first() {
                    last_seen = newest.id.clone();
                }
            }
        }
    }

    let view = handle.view();
    println!("\n{} trades, buy share {:.1}%, spread {:.4}%", view.tape_len, view.stats.buy_percent, view.ladder.spread_percent);
    for (venue, status) in &view.statuses {
        println!("  {venue}: {status}");
    }

    handle.send(Command::Shutdown).await;
    task.await?;
    Ok(())
}
