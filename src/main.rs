use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use itertools::Itertools;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use tapex_rs::config::{parse_venues, AppConfig};
use tapex_rs::engine::alerts::{AlertPolicy, TradeNotification};
use tapex_rs::engine::book::{BookMarketFilter, LADDER_DEPTH};
use tapex_rs::engine::instrument::Instrument;
use tapex_rs::engine::tape::{MarketFilter, SideFilter};
use tapex_rs::engine::types::VenueId;
use tapex_rs::market_data::registry::VenueRegistry;
use tapex_rs::market_data::router::TungsteniteConnector;
use tapex_rs::market_data::unified_book::{Command, MarketView, UnifiedBook};
use tapex_rs::telemetry;

/// Multi-venue trade tape and aggregated order book
#[derive(Parser)]
#[clap(name = "tapex")]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// TOML configuration file (defaults to ./tapex.toml when present)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, overridden by RUST_LOG
    #[clap(long, global = true)]
    log_filter: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream trades and the aggregated book, reading commands from stdin
    Run(RunArgs),

    /// List every venue with its endpoint for an instrument
    Venues {
        #[clap(long, default_value = "BTCUSDT")]
        instrument: String,
    },

    /// List the selectable instruments
    Instruments,
}

const DEFAULT_METRICS_PORT: u16 = 9000;

#[derive(clap::Args)]
struct RunArgs {
    #[clap(long)]
    instrument: Option<String>,

    /// Comma-separated venue ids
    #[clap(long, value_delimiter = ',')]
    venues: Option<Vec<String>>,

    #[clap(long, value_enum)]
    book_market: Option<BookMarketFilter>,

    #[clap(long, value_enum)]
    side: Option<SideFilter>,

    #[clap(long, value_enum)]
    market: Option<MarketFilter>,

    /// Hide trades below this notional
    #[clap(long)]
    min_notional: Option<f64>,

    /// Prometheus exporter port (needs the `metrics-exporter` feature)
    #[clap(long, default_value_t = DEFAULT_METRICS_PORT)]
    metrics_port: u16,
}

// `tapex` with no subcommand runs with the same defaults as `tapex run`.
impl Default for RunArgs {
    fn default() -> Self {
        Self {
            instrument: None,
            venues: None,
            book_market: None,
            side: None,
            market: None,
            min_notional: None,
            metrics_port: DEFAULT_METRICS_PORT,
        }
    }
}

impl RunArgs {
    fn apply(&self, cfg: &mut AppConfig) {
        if let Some(instrument) = &self.instrument {
            cfg.instrument = instrument.clone();
        }
        if let Some(venues) = &self.venues {
            cfg.venues = venues.clone();
        }
        if let Some(book_market) = self.book_market {
            cfg.book_market = book_market;
        }
        if let Some(side) = self.side {
            cfg.tape.side = side;
        }
        if let Some(market) = self.market {
            cfg.tape.market = market;
        }
        if let Some(min) = self.min_notional {
            cfg.tape.min_notional = min;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env

    let cli = Cli::parse();
    let mut cfg = AppConfig::load(cli.config.as_deref())?;
    if let Some(filter) = cli.log_filter {
        cfg.log_filter = filter;
    }
    telemetry::init_tracing(&cfg.log_filter);

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => {
            args.apply(&mut cfg);
            cfg.validate()?;
            run(cfg, args.metrics_port).await
        }
        Commands::Venues { instrument } => {
            let instrument = Instrument::from_symbol(&instrument)?;
            print_venues(&instrument);
            Ok(())
        }
        Commands::Instruments => {
            for instrument in Instrument::catalogue() {
                println!("{:<10} {}", instrument.symbol(), instrument.label());
            }
            Ok(())
        }
    }
}

fn print_venues(instrument: &Instrument) {
    for adapter in VenueRegistry.iter() {
        println!(
            "{:<16} {:<8} {:<16} book={:<5} {}",
            adapter.id().as_str(),
            adapter.market_type().as_str(),
            adapter.display_name(),
            adapter.supports_book(),
            adapter.build_endpoint(instrument).unwrap_or_else(|| "-".to_string()),
        );
    }
}

async fn run(cfg: AppConfig, metrics_port: u16) -> anyhow::Result<()> {
    if let Err(e) = telemetry::init_metrics(metrics_port) {
        warn!(error = %e, "metrics exporter unavailable");
    }

    let mut alerts = cfg.alert_policy()?;
    let (core, handle, mut notifications) = UnifiedBook::new(TungsteniteConnector, cfg.core_settings()?);
    let core_task = tokio::spawn(core.run());
    info!(instrument = %cfg.instrument, venues = ?cfg.venues, "tapex started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut render = tokio::time::interval(cfg.render_interval());
    println!("Type 'help' for available commands.");

    // CLI loop
    loop {
        tokio::select! {
            _ = render.tick() => render_view(&handle.view()),
            Some(note) = notifications.recv() => print_notification(&note),
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_input(&line, &handle.view(), &mut alerts) {
                    Input::Core(command) => {
                        if !handle.send(command).await {
                            break;
                        }
                    }
                    Input::Render => render_view(&handle.view()),
                    Input::Help => print_help(),
                    Input::Quit => break,
                    Input::Nothing => {}
                    Input::Invalid(msg) => println!("{msg}"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!("Goodbye!");
    handle.send(Command::Shutdown).await;
    core_task.await?;
    Ok(())
}

#[derive(Debug)]
enum Input {
    Core(Command),
    Render,
    Help,
    Quit,
    Nothing,
    Invalid(String),
}

fn parse_input(line: &str, view: &MarketView, alerts: &mut AlertPolicy) -> Input {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return Input::Nothing;
    };
    let rest: Vec<&str> = parts.collect();
    let arg = rest.first().copied().unwrap_or("");
    let mut tape = view.tape_filter.clone();

    match word.to_ascii_lowercase().as_str() {
        "help" | "h" => Input::Help,
        "top" | "show" => Input::Render,
        "quit" | "q" | "exit" => Input::Quit,
        "instrument" | "i" => match Instrument::from_symbol(arg) {
            Ok(instrument) => Input::Core(Command::SelectInstrument(instrument)),
            Err(e) => Input::Invalid(e.to_string()),
        },
        "venues" | "v" => match venue_list(&rest) {
            Ok(venues) => Input::Core(Command::SelectVenues(venues)),
            Err(msg) => Input::Invalid(msg),
        },
        "add" | "drop" => match VenueId::parse(arg) {
            Some(venue) => {
                let mut venues = view.venues.clone();
                if word.eq_ignore_ascii_case("add") {
                    venues.push(venue);
                } else {
                    venues.retain(|v| *v != venue);
                }
                Input::Core(Command::SelectVenues(venues))
            }
            None => Input::Invalid(format!("unknown venue `{arg}`")),
        },
        "book" => match BookMarketFilter::parse(arg) {
            Some(filter) => Input::Core(Command::SetBookMarket(filter)),
            None => Input::Invalid("usage: book combined|spot|futures".to_string()),
        },
        "side" => match SideFilter::from_str(arg, true) {
            Ok(side) => {
                tape.side = side;
                Input::Core(Command::SetTapeFilter(tape))
            }
            Err(_) => Input::Invalid("usage: side all|buy|sell".to_string()),
        },
        "market" => match MarketFilter::from_str(arg, true) {
            Ok(market) => {
                tape.market = market;
                Input::Core(Command::SetTapeFilter(tape))
            }
            Err(_) => Input::Invalid("usage: market all|spot|futures".to_string()),
        },
        "min" => match arg.parse::<f64>() {
            Ok(min) if min.is_finite() && min >= 0.0 => {
                tape.min_notional = min;
                Input::Core(Command::SetTapeFilter(tape))
            }
            _ => Input::Invalid("usage: min <notional>".to_string()),
        },
        "show-venues" => {
            let venues = if arg.eq_ignore_ascii_case("all") { Ok(Vec::new()) } else { venue_list(&rest) };
            match venues {
                Ok(venues) => {
                    tape.venues = venues;
                    Input::Core(Command::SetTapeFilter(tape))
                }
                Err(msg) => Input::Invalid(msg),
            }
        }
        "alerts" => {
            match arg.to_ascii_lowercase().as_str() {
                "on" => alerts.enabled = true,
                "off" => alerts.enabled = false,
                "whales" => alerts.whale_alerts = !alerts.whale_alerts,
                _ => return Input::Invalid("usage: alerts on|off|whales".to_string()),
            }
            Input::Core(Command::SetAlertPolicy(alerts.clone()))
        }
        _ => Input::Invalid("Unknown command. Type 'help' for available commands.".to_string()),
    }
}

fn venue_list(args: &[&str]) -> Result<Vec<VenueId>, String> {
    let names: Vec<&str> = args.iter().flat_map(|a| a.split(',')).filter(|s| !s.is_empty()).collect();
    parse_venues(&names).map_err(|e| e.to_string())
}

fn print_help() {
    println!("Available commands:");
    println!("  instrument <SYMBOL>        - Switch instrument (e.g. ETHUSDT)");
    println!("  venues <a,b,...>           - Replace the venue selection");
    println!("  add <venue> / drop <venue> - Edit the venue selection");
    println!("  book combined|spot|futures - Venues merged into the ladder");
    println!("  side all|buy|sell          - Tape side filter");
    println!("  market all|spot|futures    - Tape market filter");
    println!("  min <notional>             - Hide smaller trades");
    println!("  show-venues <a,b>|all      - Tape venue filter");
    println!("  alerts on|off|whales       - Trade alerts");
    println!("  top                        - Render now");
    println!("  quit, q                    - Exit");
}

fn print_notification(note: &TradeNotification) {
    let tag = if note.whale { "WHALE" } else { "ALERT" };
    println!(
        "[{tag}] {} {} {} @ {} (${:.0})",
        note.trade.venue, note.trade.taker_side, note.trade.quantity, note.trade.price, note.notional
    );
}

fn render_view(view: &MarketView) {
    println!("\n=== {} | gen {} | {}/{} connected ===", view.instrument, view.generation, view.connected(), view.statuses.len());
    println!("{}", view.statuses.iter().map(|(v, s)| format!("{v}:{s}")).join("  "));

    println!("--- book ({}) ---", view.book_market.as_str());
    for level in view.ladder.asks.iter().take(LADDER_DEPTH).rev() {
        println!("  ask {:>12.2} {:>12.4} {}", level.price(), level.quantity, depth_bar(level.notional, view.ladder.max_notional));
    }
    println!("  spread {:.4}%", view.ladder.spread_percent);
    for level in view.ladder.bids.iter().take(LADDER_DEPTH) {
        println!("  bid {:>12.2} {:>12.4} {}", level.price(), level.quantity, depth_bar(level.notional, view.ladder.max_notional));
    }

    let stats = &view.stats;
    println!(
        "--- tape {}/{} | buys {} sells {} | buy {:.1}% | avg ${:.0} ---",
        view.trades.len(), view.tape_len, stats.buy_count, stats.sell_count, stats.buy_percent, stats.average_notional
    );
    for trade in view.trades.iter().take(15) {
        println!(
            "  {:<16} {:<4} {:>12} {:>12} ${:.0}",
            trade.venue.as_str(), trade.taker_side.to_string(), trade.price, trade.quantity, trade.notional()
        );
    }
}

fn depth_bar(notional: f64, max: f64) -> String {
    let width = ((notional / max.max(1.0)) * 20.0).round().clamp(0.0, 20.0) as usize;
    "#".repeat(width)
}
