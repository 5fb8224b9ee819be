// ── Alert forwarding ──
//
// Bridges side-effect events to an audible/visual alert emitter owned by
// the host. A failing or slow sink never affects synchronization.

use std::sync::Arc;

use strum::{Display, IntoStaticStr};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::events::FleetEvent;

/// Named alert an emitter knows how to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum AlertCue {
    Click,
    Ding,
    DoorOpen,
    DoorClose,
    Alarm,
}

impl AlertCue {
    /// The cue for `event`, if it has one.
    pub fn for_event(event: &FleetEvent) -> Option<Self> {
        match event {
            FleetEvent::CommandSent { .. } => Some(Self::Click),
            FleetEvent::Arrived { .. } => Some(Self::Ding),
            FleetEvent::DoorOpened { .. } => Some(Self::DoorOpen),
            FleetEvent::DoorClosed { .. } => Some(Self::DoorClose),
            FleetEvent::Alarm => Some(Self::Alarm),
            FleetEvent::CommandFailed { .. } | FleetEvent::ConnectionChanged { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
#[error("alert playback failed: {0}")]
pub struct AlertError(pub String);

/// Plays alert cues. Implemented by the host.
pub trait AlertSink: Send + Sync {
    fn play(&self, cue: AlertCue) -> Result<(), AlertError>;
}

/// Relay events from `events` to `sink` until cancelled or the event
/// channel closes.
pub fn spawn_alert_forwarder(
    mut events: broadcast::Receiver<FleetEvent>,
    sink: Arc<dyn AlertSink>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = events.recv() => match result {
                    Ok(event) => {
                        let Some(cue) = AlertCue::for_event(&event) else { continue };
                        if let Err(e) = sink.play(cue) {
                            warn!(%cue, error = %e, "alert sink failed");
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(skipped = n, "alert forwarder lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        debug!("alert forwarder stopped");
    })
}
