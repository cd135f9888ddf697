// Aggregation core. Single consumer of every connection event; owns the
// tape, the ladder and the status table, and publishes owned views.

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

use crate::engine::alerts::{AlertPolicy, TradeNotification};
use crate::engine::book::{BookAggregator, BookMarketFilter, LadderView};
use crate::engine::instrument::Instrument;
use crate::engine::tape::{Tape, TapeFilter, TapeStats};
use crate::engine::types::{ConnectionStatus, Trade, VenueId};
use crate::market_data::adapters::VenueUpdate;
use crate::market_data::registry::VenueRegistry;
use crate::market_data::router::{
    ConnectionEvent, ConnectionManager, ConnectionSettings, Connector, RoutedEvent, Selection,
};

/// Requests accepted by the core.
#[derive(Debug, Clone)]
pub enum Command {
    SelectInstrument(Instrument),
    SelectVenues(Vec<VenueId>),
    SetBookMarket(BookMarketFilter),
    SetTapeFilter(TapeFilter),
    SetAlertPolicy(AlertPolicy),
    Shutdown,
}

/// Everything a reader needs, copied out of the core after each change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MarketView {
    pub generation: u64,
    pub instrument: String,
    pub venues: Vec<VenueId>,
    pub statuses: BTreeMap<VenueId, ConnectionStatus>,
    /// Filtered tape, newest first.
    pub trades: Vec<Trade>,
    /// Unfiltered tape length.
    pub tape_len: usize,
    pub tape_filter: TapeFilter,
    pub stats: TapeStats,
    pub book_market: BookMarketFilter,
    pub ladder: LadderView,
}

impl MarketView {
    pub fn connected(&self) -> usize {
        self.statuses.values().filter(|s| **s == ConnectionStatus::Connected).count()
    }
}

/// Starting state for [`UnifiedBook::new`].
#[derive(Debug, Clone)]
pub struct CoreSettings {
    pub instrument: Instrument,
    pub venues: Vec<VenueId>,
    pub book_market: BookMarketFilter,
    pub tape_filter: TapeFilter,
    pub alerts: AlertPolicy,
    pub connection: ConnectionSettings,
    pub notification_buffer: usize,
}

/// Cheap, cloneable front end for a running core.
#[derive(Debug, Clone)]
pub struct UnifiedBookHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<MarketView>,
}

impl UnifiedBookHandle {
    /// Returns false once the core has stopped.
    pub async fn send(&self, command: Command) -> bool {
        self.commands.send(command).await.is_ok()
    }

    pub fn view(&self) -> MarketView {
        self.view.borrow().clone()
    }

    /// Receiver that wakes on every published view.
    pub fn subscribe(&self) -> watch::Receiver<MarketView> {
        self.view.clone()
    }
}

pub struct UnifiedBook<C: Connector> {
    registry: VenueRegistry,
    manager: ConnectionManager<C>,
    events: mpsc::Receiver<RoutedEvent>,
    commands: mpsc::Receiver<Command>,
    instrument: Instrument,
    venues: Vec<VenueId>,
    tape: Tape,
    tape_filter: TapeFilter,
    book: BookAggregator,
    alerts: AlertPolicy,
    view_tx: watch::Sender<MarketView>,
    notify_tx: mpsc::Sender<TradeNotification>,
}

impl<C: Connector> UnifiedBook<C> {
    pub fn new(
        connector: C,
        settings: CoreSettings,
    ) -> (Self, UnifiedBookHandle, mpsc::Receiver<TradeNotification>) {
        let (manager, events) = ConnectionManager::new(connector, settings.connection);
        let (command_tx, commands) = mpsc::channel(64);
        let (view_tx, view_rx) = watch::channel(MarketView::default());
        let (notify_tx, notify_rx) = mpsc::channel(settings.notification_buffer.max(1));

        let core = Self {
            registry: VenueRegistry,
            manager,
            events,
            commands,
            instrument: settings.instrument,
            venues: normalise_venues(settings.venues),
            tape: Tape::new(),
            tape_filter: settings.tape_filter,
            book: BookAggregator::new(settings.book_market),
            alerts: settings.alerts,
            view_tx,
            notify_tx,
        };
        let handle = UnifiedBookHandle { commands: command_tx, view: view_rx };
        (core, handle, notify_rx)
    }

    /// Open the initial selection and process events until shutdown or until
    /// every handle is dropped.
    #[instrument(skip_all, fields(instrument = %self.instrument))]
    pub async fn run(mut self) {
        self.reselect();
        self.publish();
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(command) => self.apply_command(command),
                },
                Some(event) = self.events.recv() => self.apply_event(event),
            }
            self.publish();
        }
        info!("shutting down");
        self.manager.close_all();
        self.publish();
    }

    /// Apply a non-shutdown command.
    pub fn apply_command(&mut self, command: Command) {
        match command {
            Command::SelectInstrument(instrument) => {
                if instrument != self.instrument {
                    self.instrument = instrument;
                    self.reselect();
                }
            }
            Command::SelectVenues(venues) => {
                let venues = normalise_venues(venues);
                if venues != self.venues {
                    self.venues = venues;
                    self.reselect();
                }
            }
            Command::SetBookMarket(filter) => self.book.set_filter(filter),
            Command::SetTapeFilter(filter) => self.tape_filter = filter,
            Command::SetAlertPolicy(policy) => self.alerts = policy,
            Command::Shutdown => self.manager.close_all(),
        }
    }

    /// Fold one connection event into the tape, ladder and status table.
    pub fn apply_event(&mut self, routed: RoutedEvent) {
        let Some((venue, event)) = self.manager.accept(routed) else {
            return;
        };
        match event {
            ConnectionEvent::Opened => debug!(%venue, "venue connected"),
            ConnectionEvent::Update(VenueUpdate::Trade(trade)) => self.on_trade(trade),
            ConnectionEvent::Update(VenueUpdate::Book(snapshot)) => {
                metrics::counter!("tapex_book_updates_total", "venue" => venue.as_str()).increment(1);
                let market = self.registry.get(venue).market_type();
                self.book.apply(venue, market, snapshot);
            }
            ConnectionEvent::Closed(reason) => {
                match reason {
                    Some(e) => warn!(%venue, error = %e, "venue disconnected"),
                    None => info!(%venue, "venue closed"),
                }
                self.book.remove(venue);
            }
        }
    }

    pub fn view(&self) -> MarketView {
        let trades = self.tape.filtered(&self.tape_filter);
        MarketView {
            generation: self.manager.generation(),
            instrument: self.instrument.symbol().to_string(),
            venues: self.venues.clone(),
            statuses: self.manager.statuses(),
            stats: TapeStats::compute(&trades),
            trades,
            tape_len: self.tape.len(),
            tape_filter: self.tape_filter.clone(),
            book_market: self.book.filter(),
            ladder: self.book.view(),
        }
    }

    fn on_trade(&mut self, trade: Trade) {
        metrics::counter!("tapex_trades_total", "venue" => trade.venue.as_str()).increment(1);
        if let Some(notification) = self.alerts.evaluate(&trade) {
            // never stall the core on a slow alert consumer
            if self.notify_tx.try_send(notification).is_err() {
                debug!(venue = %trade.venue, "alert channel full, notification dropped");
            }
        }
        self.tape.push(trade);
    }

    /// Tear down the old selection, drop its data, then open the new one.
    fn reselect(&mut self) {
        self.manager.close_all();
        self.tape.clear();
        self.book.clear();
        self.manager.select(Selection::new(self.instrument.clone(), self.venues.iter().copied()));
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view());
    }
}

fn normalise_venues(mut venues: Vec<VenueId>) -> Vec<VenueId> {
    venues.sort();
    venues.dedup();
    venues
}
