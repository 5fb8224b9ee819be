// ── Pending hall calls ──

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::watch;

use crate::stream::StateStream;

/// Floors with an outstanding hall call.
///
/// Purely in-memory and rebuilt every session. Entries are added
/// optimistically by the dispatcher and cleared by the ingestor as soon as
/// any car reports idle at that floor.
pub struct PendingRequests {
    floors: watch::Sender<Arc<BTreeSet<i32>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        let (floors, _) = watch::channel(Arc::new(BTreeSet::new()));
        Self { floors }
    }

    /// Mark `floor` as requested. Returns `false` if it already was.
    pub fn add_request(&self, floor: i32) -> bool {
        self.floors
            .send_if_modified(|floors| Arc::make_mut(floors).insert(floor))
    }

    /// Drop `floor` if present. Returns whether anything changed.
    pub fn clear(&self, floor: i32) -> bool {
        self.floors
            .send_if_modified(|floors| Arc::make_mut(floors).remove(&floor))
    }

    /// Drop every floor in `served` with a single notification.
    pub(crate) fn clear_served(&self, served: impl IntoIterator<Item = i32>) -> bool {
        self.floors.send_if_modified(|floors| {
            let mut changed = false;
            for floor in served {
                if floors.contains(&floor) {
                    Arc::make_mut(floors).remove(&floor);
                    changed = true;
                }
            }
            changed
        })
    }

    pub fn contains(&self, floor: i32) -> bool {
        self.floors.borrow().contains(&floor)
    }

    /// Requested floors in ascending order.
    pub fn floors(&self) -> Arc<BTreeSet<i32>> {
        self.floors.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.floors.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.floors.borrow().is_empty()
    }

    pub fn subscribe(&self) -> StateStream<BTreeSet<i32>> {
        StateStream::new(self.floors.subscribe())
    }

    pub(crate) fn reset(&self) {
        self.floors.send_if_modified(|floors| {
            if floors.is_empty() {
                return false;
            }
            *floors = Arc::new(BTreeSet::new());
            true
        });
    }
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}
