//! STOMP-over-WebSocket link with fixed-delay auto-reconnect.
//!
//! [`StompLink::spawn`] starts a background task that owns the socket:
//! it performs the STOMP handshake, subscribes once per session, relays
//! inbound `MESSAGE` frames and link-state changes through an `mpsc`
//! channel (preserving arrival order), and writes outbound `SEND` frames
//! queued through a [`Publisher`]. Any transport close or protocol error
//! demotes the link to [`LinkState::Errored`] and schedules a reconnect
//! after [`ReconnectConfig::delay`], forever, until cancelled.
//!
//! # Example
//!
//! ```rust,ignore
//! use liftdeck_api::{LinkConfig, LinkEvent, StompLink};
//! use tokio_util::sync::CancellationToken;
//!
//! let (events_tx, mut events_rx) = tokio::sync::mpsc::channel(256);
//! let config = LinkConfig::new("wss://lifts.example.com/ws/websocket".parse()?, "/topic/elevators");
//! let link = StompLink::spawn(config, events_tx, CancellationToken::new());
//!
//! while let Some(event) = events_rx.recv().await {
//!     if let LinkEvent::Message(msg) = event {
//!         println!("{}: {}", msg.destination, msg.body);
//!     }
//! }
//!
//! link.shutdown().await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::stomp::{self, Decoded, Frame, FrameCommand, HeartBeat};

const OUTBOUND_CHANNEL_CAPACITY: usize = 64;
const SUBSCRIPTION_ID: &str = "sub-0";

// ── Configuration ────────────────────────────────────────────────────

/// Fixed-delay reconnection policy. Reconnection is never capped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay between a failure and the next attempt. Default: 5s.
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(5000),
        }
    }
}

/// Everything the link task needs to run a session.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// WebSocket URL of the broker (`ws://` or `wss://`).
    pub url: Url,
    /// Topic subscribed once per session.
    pub topic: String,
    pub reconnect: ReconnectConfig,
    pub heart_beat: HeartBeat,
}

impl LinkConfig {
    pub fn new(url: Url, topic: impl Into<String>) -> Self {
        Self {
            url,
            topic: topic.into(),
            reconnect: ReconnectConfig::default(),
            heart_beat: HeartBeat::default(),
        }
    }
}

// ── Link events ──────────────────────────────────────────────────────

/// Lifecycle state of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Errored,
}

/// A `MESSAGE` frame received on the subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub destination: String,
    pub subscription: Option<String>,
    pub body: String,
}

/// What the link reports to its consumer, in arrival order.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    State(LinkState),
    Message(Arc<Inbound>),
}

// ── Publisher ────────────────────────────────────────────────────────

/// A queued outbound `SEND`, resolved once the frame hits the socket.
#[derive(Debug)]
pub struct PublishRequest {
    pub destination: String,
    pub body: String,
    pub reply: oneshot::Sender<Result<(), Error>>,
}

impl PublishRequest {
    /// Report the outcome; a vanished caller is not an error.
    pub fn resolve(self, result: Result<(), Error>) {
        let _ = self.reply.send(result);
    }
}

/// Cloneable sending half for outbound publishes.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: mpsc::Sender<PublishRequest>,
}

impl Publisher {
    /// Create a publisher and the receiving end a link task drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<PublishRequest>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue a JSON body for `destination` and wait until it is written.
    pub async fn publish(
        &self,
        destination: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<(), Error> {
        let (reply, done) = oneshot::channel();
        let request = PublishRequest {
            destination: destination.into(),
            body: body.into(),
            reply,
        };
        self.tx.send(request).await.map_err(|_| Error::LinkDown)?;
        done.await.map_err(|_| Error::LinkDown)?
    }
}

// ── StompLink ────────────────────────────────────────────────────────

/// Handle to a running link task.
pub struct StompLink {
    publisher: Publisher,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StompLink {
    /// Spawn the link task. Returns immediately; the first connection
    /// attempt happens asynchronously and is reported through `events`.
    pub fn spawn(
        config: LinkConfig,
        events: mpsc::Sender<LinkEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let (publisher, outbound) = Publisher::channel(OUTBOUND_CHANNEL_CAPACITY);
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            link_loop(config, events, outbound, task_cancel).await;
        });

        Self {
            publisher,
            cancel,
            task,
        }
    }

    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Cancel the task and wait for it to release the socket.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "STOMP link task ended abnormally");
        }
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → handshake → pump frames; on failure, wait → retry.
async fn link_loop(
    config: LinkConfig,
    events: mpsc::Sender<LinkEvent>,
    mut outbound: mpsc::Receiver<PublishRequest>,
    cancel: CancellationToken,
) {
    let mut attempt: u64 = 0;

    loop {
        if events.send(LinkEvent::State(LinkState::Connecting)).await.is_err() {
            break;
        }

        let result = run_session(&config, &events, &mut outbound, &cancel).await;
        if cancel.is_cancelled() {
            break;
        }

        attempt += 1;
        match result {
            Ok(()) => tracing::info!(attempt, "STOMP session closed by peer"),
            Err(e) => tracing::warn!(error = %e, attempt, "STOMP session failed"),
        }
        if events.send(LinkEvent::State(LinkState::Errored)).await.is_err() {
            break;
        }

        tracing::info!(
            delay_ms = u64::try_from(config.reconnect.delay.as_millis()).unwrap_or(u64::MAX),
            "Waiting before reconnect"
        );
        if !wait_rejecting(config.reconnect.delay, &mut outbound, &cancel).await {
            break;
        }
    }

    // Anything still queued can never be written.
    outbound.close();
    while let Ok(request) = outbound.try_recv() {
        request.resolve(Err(Error::LinkDown));
    }
    let _ = events.send(LinkEvent::State(LinkState::Disconnected)).await;
    tracing::debug!("STOMP link loop exiting");
}

/// Sleep out the reconnect delay, failing any publish that arrives
/// meanwhile. Returns `false` if cancelled.
async fn wait_rejecting(
    delay: Duration,
    outbound: &mut mpsc::Receiver<PublishRequest>,
    cancel: &CancellationToken,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return false,
            () = &mut sleep => return true,
            Some(request) = outbound.recv() => {
                tracing::debug!(destination = %request.destination, "publish rejected while link is down");
                request.resolve(Err(Error::LinkDown));
            }
        }
    }
}

// ── Single session lifecycle ─────────────────────────────────────────

/// Run one STOMP session until the socket drops, the broker errors, or
/// the link is cancelled (`Ok` in the last two benign cases).
async fn run_session(
    config: &LinkConfig,
    events: &mpsc::Sender<LinkEvent>,
    outbound: &mut mpsc::Receiver<PublishRequest>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %config.url, "Connecting to STOMP broker");

    let connect = tokio_tungstenite::connect_async(config.url.as_str());
    let (ws_stream, _response) = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        result = connect => result.map_err(|e| Error::WebSocketConnect(e.to_string()))?,
    };
    let (mut write, mut read) = ws_stream.split();

    let host = config.url.host_str().unwrap_or("localhost");
    send_frame(&mut write, &Frame::connect(host, config.heart_beat)).await?;

    // ── Handshake ──
    let connected = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        frame = next_frame(&mut read) => frame?,
    };
    let connected = match connected.command {
        FrameCommand::Connected => connected,
        FrameCommand::Error => return Err(broker_error(&connected)),
        other => return Err(Error::Handshake(format!("expected CONNECTED, got {other}"))),
    };

    let server_beat = connected
        .get("heart-beat")
        .and_then(HeartBeat::parse)
        .unwrap_or(HeartBeat::DISABLED);
    let mut beat = config.heart_beat.outgoing_interval(server_beat).map(|period| {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    tracing::info!(
        version = connected.get("version").unwrap_or("1.0"),
        "STOMP session established"
    );
    if events.send(LinkEvent::State(LinkState::Connected)).await.is_err() {
        return Ok(());
    }

    send_frame(&mut write, &Frame::subscribe(SUBSCRIPTION_ID, &config.topic)).await?;
    tracing::debug!(topic = %config.topic, "subscribed");

    // ── Pump ──
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = send_frame(&mut write, &Frame::disconnect()).await;
                let _ = write.close().await;
                return Ok(());
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        for decoded in stomp::decode(&text)? {
                            let Decoded::Frame(frame) = decoded else {
                                tracing::trace!("heart-beat received");
                                continue;
                            };
                            handle_frame(frame, events).await?;
                        }
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        return Err(match frame {
                            Some(cf) => Error::WebSocketClosed {
                                code: u16::from(cf.code),
                                reason: cf.reason.as_str().to_owned(),
                            },
                            None => Error::WebSocketClosed {
                                code: 1005,
                                reason: "no close frame payload".into(),
                            },
                        });
                    }
                    Some(Ok(_)) => {
                        // Binary, Ping, Pong, Frame -- tungstenite answers pings itself
                    }
                    Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                    None => {
                        tracing::info!("WebSocket stream ended");
                        return Ok(());
                    }
                }
            }
            Some(request) = outbound.recv() => {
                let frame = Frame::send_json(&request.destination, request.body.as_str());
                match send_frame(&mut write, &frame).await {
                    Ok(()) => {
                        tracing::debug!(destination = %request.destination, "published");
                        request.resolve(Ok(()));
                    }
                    Err(e) => {
                        let reason = e.to_string();
                        request.resolve(Err(e));
                        return Err(Error::WebSocketConnect(reason));
                    }
                }
            }
            () = tick(&mut beat) => {
                write
                    .send(tungstenite::Message::text("\n"))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
                tracing::trace!("heart-beat sent");
            }
        }
    }
}

/// Route one post-handshake frame.
async fn handle_frame(frame: Frame, events: &mpsc::Sender<LinkEvent>) -> Result<(), Error> {
    match frame.command {
        FrameCommand::Message => {
            let inbound = Inbound {
                destination: frame.get("destination").unwrap_or_default().to_owned(),
                subscription: frame.get("subscription").map(str::to_owned),
                body: frame.body,
            };
            // A closed consumer means the owning session is going away.
            let _ = events.send(LinkEvent::Message(Arc::new(inbound))).await;
            Ok(())
        }
        FrameCommand::Error => Err(broker_error(&frame)),
        FrameCommand::Receipt => {
            tracing::trace!(receipt = frame.get("receipt-id"), "receipt");
            Ok(())
        }
        other => {
            tracing::debug!(command = %other, "ignoring unexpected frame");
            Ok(())
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

async fn send_frame<S>(write: &mut S, frame: &Frame) -> Result<(), Error>
where
    S: Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    write
        .send(tungstenite::Message::Text(frame.encode().into()))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))
}

/// Read until the next complete frame, skipping heart-beats.
async fn next_frame<S>(read: &mut S) -> Result<Frame, Error>
where
    S: Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    loop {
        match read.next().await {
            Some(Ok(tungstenite::Message::Text(text))) => {
                let frame = stomp::decode(&text)?.into_iter().find_map(|d| match d {
                    Decoded::Frame(f) => Some(f),
                    Decoded::HeartBeat => None,
                });
                if let Some(frame) = frame {
                    return Ok(frame);
                }
            }
            Some(Ok(tungstenite::Message::Close(_))) | None => {
                return Err(Error::Handshake("socket closed before CONNECTED".into()));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
        }
    }
}

fn broker_error(frame: &Frame) -> Error {
    let message = frame
        .get("message")
        .map(str::to_owned)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| frame.body.trim().to_owned());
    Error::Stomp { message }
}

/// Resolve on the next heart-beat tick, or never when heart-beats are off.
async fn tick(beat: &mut Option<Interval>) {
    match beat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

// ── Tests ────────────────────────────────────────────────────────────
