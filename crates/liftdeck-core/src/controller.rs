// ── Controller facade ──
//
// Owns the session lifecycle: the STOMP link, the single pump task that
// applies inbound snapshots in arrival order, and the connection state
// every other component reads.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use liftdeck_api::{
    ControlClient, LinkConfig, LinkEvent, LinkState, Publisher, ReconnectConfig, StompLink,
};
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::command::Direction;
use crate::config::ControllerConfig;
use crate::dispatch::{Dispatcher, FleetEmergencyReport};
use crate::error::CoreError;
use crate::events::FleetEvent;
use crate::ingest::SnapshotIngestor;
use crate::model::{FleetSnapshot, UnitId};
use crate::store::{FleetStore, PendingRequests};

const EVENT_CHANNEL_SIZE: usize = 256;
const LINK_EVENT_CHANNEL_SIZE: usize = 64;

// ── ConnectionState ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Errored,
}

impl ConnectionState {
    /// Whether commands may be sent.
    pub fn is_usable(self) -> bool {
        self == Self::Connected
    }
}

impl From<LinkState> for ConnectionState {
    fn from(state: LinkState) -> Self {
        match state {
            LinkState::Disconnected => Self::Disconnected,
            LinkState::Connecting => Self::Connecting,
            LinkState::Connected => Self::Connected,
            LinkState::Errored => Self::Errored,
        }
    }
}

/// Single writer of the connection state.
#[derive(Clone)]
struct ConnectionReporter {
    state: Arc<watch::Sender<ConnectionState>>,
    events: broadcast::Sender<FleetEvent>,
}

impl ConnectionReporter {
    /// Publish `next`; repeats of the current state are swallowed.
    fn set(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        if !changed {
            return;
        }

        match next {
            ConnectionState::Connected => info!("connected to elevator controller"),
            ConnectionState::Errored => warn!("elevator controller link errored, will reconnect"),
            ConnectionState::Connecting | ConnectionState::Disconnected => {
                debug!(state = ?next, "connection state changed");
            }
        }
        let _ = self.events.send(FleetEvent::ConnectionChanged { state: next });
    }

    fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }
}

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Dropping the last clone
/// cancels the session's background tasks.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    store: Arc<FleetStore>,
    pending: Arc<PendingRequests>,
    reporter: ConnectionReporter,
    publisher: Arc<ArcSwapOption<Publisher>>,
    dispatcher: Dispatcher,
    /// Parent of every session token.
    cancel: CancellationToken,
    session: Mutex<Option<Session>>,
}

/// One `connect()` .. `disconnect()` cycle.
struct Session {
    link: StompLink,
    pump: JoinHandle<()>,
    cancel: CancellationToken,
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Controller {
    /// Create a controller from configuration. Does NOT connect; call
    /// [`connect()`](Self::connect) to start the session.
    pub fn new(config: ControllerConfig) -> Result<Self, CoreError> {
        config.websocket_url()?;
        let control = ControlClient::new(config.url.clone(), &config.transport())?
            .with_prefix(config.control_prefix.clone());

        let store = Arc::new(FleetStore::new());
        let pending = Arc::new(PendingRequests::new());
        let (state, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let publisher = Arc::new(ArcSwapOption::empty());

        let dispatcher = Dispatcher::new(
            state_rx,
            Arc::clone(&publisher),
            control,
            Arc::clone(&store),
            Arc::clone(&pending),
            event_tx.clone(),
            config.destinations.clone(),
            config.floors,
        );

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                store,
                pending,
                reporter: ConnectionReporter {
                    state: Arc::new(state),
                    events: event_tx,
                },
                publisher,
                dispatcher,
                cancel: CancellationToken::new(),
                session: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Start a session.
    ///
    /// Returns once the link task is spawned; the handshake completes in
    /// the background and is reported through
    /// [`connection_state()`](Self::connection_state). A no-op while a
    /// session exists, including while it waits to reconnect.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let mut session = self.inner.session.lock().await;
        if session.is_some() {
            debug!("connect ignored, session already active");
            return Ok(());
        }

        let config = &self.inner.config;
        let ws_url = config.websocket_url()?;

        // Fresh session: the first snapshot is silent and old calls are gone.
        self.inner.store.reset();
        self.inner.pending.reset();
        self.inner.reporter.set(ConnectionState::Connecting);

        let cancel = self.inner.cancel.child_token();
        let (link_tx, link_rx) = mpsc::channel(LINK_EVENT_CHANNEL_SIZE);
        let mut link_config = LinkConfig::new(ws_url.clone(), config.destinations.fleet_topic.clone());
        link_config.reconnect = ReconnectConfig {
            delay: config.reconnect_delay,
        };
        link_config.heart_beat = config.heart_beat;

        let link = StompLink::spawn(link_config, link_tx, cancel.clone());
        self.inner.publisher.store(Some(Arc::new(link.publisher())));

        let ingestor = SnapshotIngestor::new(
            Arc::clone(&self.inner.store),
            Arc::clone(&self.inner.pending),
            self.inner.reporter.events.clone(),
            config.floors,
        );
        let pump = tokio::spawn(pump_link_events(
            link_rx,
            ingestor,
            self.inner.reporter.clone(),
            config.destinations.fleet_topic.clone(),
            cancel.clone(),
        ));

        *session = Some(Session { link, pump, cancel });
        info!(url = %ws_url, "elevator controller session started");
        Ok(())
    }

    /// End the session: release the socket, drop any pending reconnect,
    /// and report `Disconnected`. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        let Some(session) = self.inner.session.lock().await.take() else {
            self.inner.reporter.set(ConnectionState::Disconnected);
            return;
        };

        self.inner.publisher.store(None);
        session.cancel.cancel();
        session.link.shutdown().await;
        if let Err(e) = session.pump.await {
            warn!(error = %e, "link pump ended abnormally");
        }

        self.inner.reporter.set(ConnectionState::Disconnected);
        info!("elevator controller session ended");
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.reporter.state.subscribe()
    }

    pub fn current_state(&self) -> ConnectionState {
        self.inner.reporter.current()
    }

    /// Whether commands would currently be attempted.
    pub fn is_usable(&self) -> bool {
        self.current_state().is_usable()
    }

    /// Subscribe to side-effect events.
    pub fn events(&self) -> broadcast::Receiver<FleetEvent> {
        self.inner.reporter.events.subscribe()
    }

    pub fn store(&self) -> &Arc<FleetStore> {
        &self.inner.store
    }

    pub fn pending(&self) -> &Arc<PendingRequests> {
        &self.inner.pending
    }

    pub fn snapshot(&self) -> Arc<FleetSnapshot> {
        self.inner.store.snapshot()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    // ── Commands (delegate to Dispatcher) ────────────────────────

    pub async fn call_elevator(&self, floor: i32, direction: Direction) -> Result<(), CoreError> {
        self.inner.dispatcher.call_elevator(floor, direction).await
    }

    pub async fn send_to_floor(&self, unit_id: UnitId, floor: i32) -> Result<(), CoreError> {
        self.inner.dispatcher.send_to_floor(unit_id, floor).await
    }

    pub async fn trigger_emergency(&self, unit_id: UnitId) -> Result<(), CoreError> {
        self.inner.dispatcher.trigger_emergency(unit_id).await
    }

    pub async fn clear_emergency(&self, unit_id: UnitId) -> Result<(), CoreError> {
        self.inner.dispatcher.clear_emergency(unit_id).await
    }

    pub async fn set_maintenance(&self, unit_id: UnitId, enabled: bool) -> Result<(), CoreError> {
        self.inner.dispatcher.set_maintenance(unit_id, enabled).await
    }

    pub async fn trigger_fleet_emergency(&self) -> Result<FleetEmergencyReport, CoreError> {
        self.inner.dispatcher.trigger_fleet_emergency().await
    }
}

// ── Link pump ────────────────────────────────────────────────────

/// Apply link events in arrival order until the session ends.
async fn pump_link_events(
    mut link_rx: mpsc::Receiver<LinkEvent>,
    ingestor: SnapshotIngestor,
    reporter: ConnectionReporter,
    topic: String,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = link_rx.recv() => {
                let Some(event) = event else { break };
                match event {
                    LinkEvent::State(state) => reporter.set(state.into()),
                    LinkEvent::Message(message) => {
                        if !message.destination.is_empty() && message.destination != topic {
                            debug!(destination = %message.destination, "ignoring message off the fleet topic");
                            continue;
                        }
                        // `ingest` warns about a malformed snapshot and leaves state
                        // untouched, so an error needs no handling here.
                        if let Ok(events) = ingestor.ingest(&message.body) {
                            trace!(events = events.len(), "fleet snapshot applied");
                        }
                    }
                }
            }
        }
    }
    debug!("link pump stopped");
}
