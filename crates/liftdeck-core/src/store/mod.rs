// ── State stores ──
//
// The two pieces of client-side state: the last applied fleet snapshot and
// the floors with an outstanding hall call. Both are owned by the core and
// handed out read-only through `StateStream`.

mod fleet_store;
mod pending;

pub use fleet_store::FleetStore;
pub use pending::PendingRequests;
