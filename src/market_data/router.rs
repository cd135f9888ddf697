// Connection lifecycle: one tokio task per selected venue, torn down and
// rebuilt wholesale whenever the (instrument, venue set) selection changes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, instrument, trace, warn};

use crate::engine::instrument::Instrument;
use crate::engine::types::{ConnectionStatus, VenueId};
use crate::error::ConnectionError;
use crate::market_data::adapters::{interpret, VenueAdapter, VenueUpdate};
use crate::market_data::normaliser::{decode_frame, Frame};
use crate::market_data::registry::VenueRegistry;

/// One open duplex socket.
#[async_trait]
pub trait WsSession: Send {
    async fn send_text(&mut self, text: String) -> Result<(), ConnectionError>;

    /// Next data frame. `None` once the peer has closed.
    async fn next_frame(&mut self) -> Option<Result<Frame, ConnectionError>>;

    async fn close(&mut self);
}

/// Opens sessions. The live implementation is [`TungsteniteConnector`].
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: WsSession + 'static;

    async fn connect(&self, url: &str) -> Result<Self::Session, ConnectionError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

pub struct TungsteniteSession {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connector for TungsteniteConnector {
    type Session = TungsteniteSession;

    async fn connect(&self, url: &str) -> Result<Self::Session, ConnectionError> {
        let (stream, response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            ConnectionError::Connect { url: url.to_string(), reason: e.to_string() }
        })?;
        debug!(url, status = %response.status(), "websocket handshake complete");
        Ok(TungsteniteSession { stream })
    }
}

#[async_trait]
impl WsSession for TungsteniteSession {
    async fn send_text(&mut self, text: String) -> Result<(), ConnectionError> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| ConnectionError::Send(e.to_string()))
    }

    async fn next_frame(&mut self) -> Option<Result<Frame, ConnectionError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(Frame::Text(text))),
                Ok(Message::Binary(bytes)) => return Some(Ok(Frame::Binary(bytes))),
                Ok(Message::Close(_)) => return None,
                // tungstenite answers pings itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Err(e) => return Some(Err(ConnectionError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

/// Per-connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Idle,
    Connecting,
    Connected,
    Closed,
}

impl ConnectionPhase {
    pub fn status(&self) -> ConnectionStatus {
        match self {
            ConnectionPhase::Idle | ConnectionPhase::Connecting => ConnectionStatus::Connecting,
            ConnectionPhase::Connected => ConnectionStatus::Connected,
            ConnectionPhase::Closed => ConnectionStatus::Disconnected,
        }
    }
}

/// The governing (instrument, venue set) tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub instrument: Instrument,
    pub venues: Vec<VenueId>,
}

impl Selection {
    /// Venues are deduplicated and kept in id order.
    pub fn new(instrument: Instrument, venues: impl IntoIterator<Item = VenueId>) -> Self {
        let mut venues: Vec<VenueId> = venues.into_iter().collect();
        venues.sort();
        venues.dedup();
        Self { instrument, venues }
    }
}

#[derive(Debug)]
pub enum ConnectionEvent {
    Opened,
    Update(VenueUpdate),
    Closed(Option<ConnectionError>),
}

/// A connection event stamped with the selection it belongs to.
#[derive(Debug)]
pub struct RoutedEvent {
    pub generation: u64,
    pub venue: VenueId,
    pub event: ConnectionEvent,
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub connect_timeout: Duration,
    pub max_frame_bytes: usize,
    pub event_buffer: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            max_frame_bytes: 1 << 20,
            event_buffer: 4096,
        }
    }
}

#[derive(Debug)]
struct ConnectionHandle {
    phase: ConnectionPhase,
    task: Option<JoinHandle<()>>,
}

impl ConnectionHandle {
    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.phase = ConnectionPhase::Closed;
    }
}

/// Owns the connection table for the current selection.
pub struct ConnectionManager<C: Connector> {
    connector: Arc<C>,
    registry: VenueRegistry,
    settings: ConnectionSettings,
    generation: u64,
    connections: AHashMap<VenueId, ConnectionHandle>,
    events_tx: mpsc::Sender<RoutedEvent>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Manager plus the receiving end of every connection's events.
    pub fn new(connector: C, settings: ConnectionSettings) -> (Self, mpsc::Receiver<RoutedEvent>) {
        let (events_tx, events_rx) = mpsc::channel(settings.event_buffer.max(1));
        let manager = Self {
            connector: Arc::new(connector),
            registry: VenueRegistry,
            settings,
            generation: 0,
            connections: AHashMap::new(),
            events_tx,
        };
        (manager, events_rx)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self, venue: VenueId) -> Option<ConnectionPhase> {
        self.connections.get(&venue).map(|c| c.phase)
    }

    pub fn statuses(&self) -> BTreeMap<VenueId, ConnectionStatus> {
        self.connections.iter().map(|(venue, c)| (*venue, c.phase.status())).collect()
    }

    /// Replace the selection. Every connection of the previous selection is
    /// aborted before the first new one is spawned.
    #[instrument(skip(self, selection), fields(instrument = %selection.instrument, venues = selection.venues.len()))]
    pub fn select(&mut self, selection: Selection) {
        self.close_all();
        self.generation += 1;
        info!(generation = self.generation, "opening venue connections");

        for venue in &selection.venues {
            let adapter = self.registry.get(*venue);
            let mut handle = ConnectionHandle { phase: ConnectionPhase::Idle, task: None };
            match adapter.build_endpoint(&selection.instrument) {
                Some(url) => {
                    handle.phase = ConnectionPhase::Connecting;
                    handle.task = Some(tokio::spawn(run_connection(
                        Arc::clone(&self.connector),
                        adapter,
                        selection.instrument.clone(),
                        url,
                        self.settings,
                        self.generation,
                        self.events_tx.clone(),
                    )));
                }
                // no endpoint for this instrument: the venue stays inert
                None => debug!(%venue, "venue has no endpoint for instrument"),
            }
            self.connections.insert(*venue, handle);
        }
        self.record_gauges();
    }

    /// Abort every connection and forget the table.
    pub fn close_all(&mut self) {
        for (venue, mut handle) in self.connections.drain() {
            trace!(%venue, "aborting connection");
            handle.abort();
        }
        self.record_gauges();
    }

    /// Fold an event into the table. Events from a superseded selection
    /// come back as `None`.
    pub fn accept(&mut self, routed: RoutedEvent) -> Option<(VenueId, ConnectionEvent)> {
        if routed.generation != self.generation {
            trace!(venue = %routed.venue, generation = routed.generation, "dropping stale event");
            return None;
        }
        let handle = self.connections.get_mut(&routed.venue)?;
        match &routed.event {
            ConnectionEvent::Opened => {
                handle.phase = ConnectionPhase::Connected;
                self.record_gauges();
            }
            ConnectionEvent::Closed(_) => {
                handle.phase = ConnectionPhase::Closed;
                handle.task = None;
                self.record_gauges();
            }
            ConnectionEvent::Update(_) => {}
        }
        Some((routed.venue, routed.event))
    }

    fn record_gauges(&self) {
        for status in [ConnectionStatus::Connecting, ConnectionStatus::Connected, ConnectionStatus::Disconnected] {
            let n = self.connections.values().filter(|c| c.phase.status() == status).count();
            metrics::gauge!("tapex_connections", "status" => status.as_str()).set(n as f64);
        }
    }
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        for handle in self.connections.values_mut() {
            handle.abort();
        }
    }
}

async fn next_beat(beat: &mut Option<Interval>) {
    match beat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Drive one venue socket until it closes or the task is aborted.
#[instrument(skip_all, fields(venue = %adapter.id(), generation = generation))]
async fn run_connection<C: Connector>(
    connector: Arc<C>,
    adapter: &'static dyn VenueAdapter,
    instrument: Instrument,
    url: String,
    settings: ConnectionSettings,
    generation: u64,
    events: mpsc::Sender<RoutedEvent>,
) {
    let venue = adapter.id();
    let emit = |event: ConnectionEvent| RoutedEvent { generation, venue, event };

    let connected = tokio::time::timeout(settings.connect_timeout, connector.connect(&url)).await;
    let mut session = match connected {
        Ok(Ok(session)) => session,
        Ok(Err(e)) => {
            warn!(error = %e, "connect failed");
            let _ = events.send(emit(ConnectionEvent::Closed(Some(e)))).await;
            return;
        }
        Err(_) => {
            let e = ConnectionError::Timeout { url, timeout_ms: settings.connect_timeout.as_millis() as u64 };
            warn!(error = %e, "connect timed out");
            let _ = events.send(emit(ConnectionEvent::Closed(Some(e)))).await;
            return;
        }
    };

    if events.send(emit(ConnectionEvent::Opened)).await.is_err() {
        session.close().await;
        return;
    }
    info!(%url, "connected");

    for frame in adapter.build_subscription(&instrument) {
        if let Err(e) = session.send_text(frame.to_string()).await {
            warn!(error = %e, "subscription failed");
            session.close().await;
            let _ = events.send(emit(ConnectionEvent::Closed(Some(e)))).await;
            return;
        }
    }

    let heartbeat = adapter.heartbeat();
    let mut beat = heartbeat.as_ref().map(|hb| {
        let mut interval = tokio::time::interval_at(Instant::now() + hb.every, hb.every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    let reason = loop {
        tokio::select! {
            frame = session.next_frame() => {
                let frame = match frame {
                    None => break None,
                    Some(Err(e)) => break Some(e),
                    Some(Ok(frame)) => frame,
                };
                metrics::counter!("tapex_frames_total", "venue" => venue.as_str()).increment(1);
                let Some(value) = decode_frame(&frame, settings.max_frame_bytes) else {
                    metrics::counter!("tapex_frames_ignored_total", "venue" => venue.as_str()).increment(1);
                    trace!(bytes = frame.len(), "undecodable frame");
                    continue;
                };
                if let Some(reply) = adapter.on_message(&value) {
                    if let Err(e) = session.send_text(reply).await {
                        break Some(e);
                    }
                }
                match interpret(adapter, &instrument, &value) {
                    Some(update) => {
                        if events.send(emit(ConnectionEvent::Update(update))).await.is_err() {
                            // core is gone
                            session.close().await;
                            return;
                        }
                    }
                    None => {
                        metrics::counter!("tapex_frames_ignored_total", "venue" => venue.as_str()).increment(1);
                        trace!("frame carried no trade or book");
                    }
                }
            }
            _ = next_beat(&mut beat) => {
                if let Some(hb) = &heartbeat {
                    if let Err(e) = session.send_text(hb.frame.clone()).await {
                        break Some(e);
                    }
                }
            }
        }
    };

    match &reason {
        Some(e) => warn!(error = %e, "connection lost"),
        None => info!("closed by venue"),
    }
    session.close().await;
    let _ = events.send(emit(ConnectionEvent::Closed(reason))).await;
}
