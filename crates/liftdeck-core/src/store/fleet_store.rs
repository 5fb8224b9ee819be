// ── Fleet state store ──

use std::sync::Arc;

use tokio::sync::watch;

use crate::model::{FleetSnapshot, UnitId};
use crate::stream::StateStream;

/// Holds the canonical fleet snapshot.
///
/// Writes swap a whole `Arc<FleetSnapshot>`, so a reader holding the
/// previous `Arc` keeps a consistent view and never sees a torn mix of
/// old and new units.
pub struct FleetStore {
    snapshot: watch::Sender<Arc<FleetSnapshot>>,
}

impl FleetStore {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(FleetSnapshot::empty()));
        Self { snapshot }
    }

    /// The snapshot as of now.
    pub fn snapshot(&self) -> Arc<FleetSnapshot> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> StateStream<FleetSnapshot> {
        StateStream::new(self.snapshot.subscribe())
    }

    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.snapshot.borrow().unit_ids()
    }

    /// Install `next` and hand back what it replaced.
    pub(crate) fn replace(&self, next: FleetSnapshot) -> Arc<FleetSnapshot> {
        self.snapshot.send_replace(Arc::new(next))
    }

    /// Forget everything; the next snapshot is treated as the first.
    pub(crate) fn reset(&self) {
        self.snapshot.send_replace(Arc::new(FleetSnapshot::empty()));
    }
}

impl Default for FleetStore {
    fn default() -> Self {
        Self::new()
    }
}
