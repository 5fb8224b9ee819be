// ── Domain model ──
//
// Server-authoritative elevator state. The client never edits a Unit;
// it only replaces whole snapshots as they arrive.

pub mod snapshot;
pub mod unit;

pub use snapshot::FleetSnapshot;
pub use unit::{DoorState, MovementState, Unit, UnitId, UnitMode};
