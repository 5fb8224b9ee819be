// ── Snapshot ingestion ──
//
// Turns raw fleet messages into store updates and side-effect events.
// Runs on the single pump task, so snapshots are applied strictly in
// arrival order and one at a time.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::config::FloorRange;
use crate::error::CoreError;
use crate::events::FleetEvent;
use crate::model::{DoorState, FleetSnapshot, Unit};
use crate::store::{FleetStore, PendingRequests};

pub struct SnapshotIngestor {
    store: Arc<FleetStore>,
    pending: Arc<PendingRequests>,
    events: broadcast::Sender<FleetEvent>,
    floors: FloorRange,
}

impl SnapshotIngestor {
    pub fn new(
        store: Arc<FleetStore>,
        pending: Arc<PendingRequests>,
        events: broadcast::Sender<FleetEvent>,
        floors: FloorRange,
    ) -> Self {
        Self {
            store,
            pending,
            events,
            floors,
        }
    }

    /// Parse and apply one raw message body.
    ///
    /// A malformed body is logged and dropped without touching any state;
    /// the error is returned only so callers can count it.
    pub fn ingest(&self, raw: &str) -> Result<Vec<FleetEvent>, CoreError> {
        match FleetSnapshot::parse(raw, self.floors) {
            Ok(next) => Ok(self.apply(next)),
            Err(e) => {
                warn!(error = %e, bytes = raw.len(), "discarding fleet snapshot");
                Err(e)
            }
        }
    }

    /// Apply an already-validated snapshot.
    ///
    /// Order: diff against the stored snapshot, clear served hall calls,
    /// swap the store, then broadcast. Listeners reading the store on
    /// receipt of an event therefore see the snapshot that caused it.
    pub fn apply(&self, next: FleetSnapshot) -> Vec<FleetEvent> {
        let previous = self.store.snapshot();
        let events = if previous.is_primed() {
            diff_units(previous.units(), next.units())
        } else {
            debug!(units = next.len(), "first fleet snapshot of session");
            Vec::new()
        };

        let served = next
            .units()
            .iter()
            .filter(|u| u.is_idle())
            .map(|u| u.current_floor);
        if self.pending.clear_served(served) {
            trace!(pending = ?self.pending.floors(), "cleared served hall calls");
        }

        self.store.replace(next);

        for event in &events {
            // No receivers is fine; nobody is listening yet.
            let _ = self.events.send(event.clone());
        }
        events
    }
}

/// Derive side-effect events from two consecutive snapshots.
///
/// Cars are matched by position, not id. Only the overlapping index range
/// is compared; added or removed cars produce no events.
pub fn diff_units(previous: &[Unit], next: &[Unit]) -> Vec<FleetEvent> {
    let mut events = Vec::new();
    for (before, after) in previous.iter().zip(next) {
        if !before.is_idle() && after.is_idle() {
            events.push(FleetEvent::Arrived {
                unit_id: after.id,
                floor: after.current_floor,
            });
        }
        if before.door_state != after.door_state {
            events.push(match after.door_state {
                DoorState::Open => FleetEvent::DoorOpened { unit_id: after.id },
                DoorState::Closed => FleetEvent::DoorClosed { unit_id: after.id },
            });
        }
    }
    events
}
