//! Fleet-state synchronization and command dispatch for a remote elevator
//! controller.
//!
//! This crate keeps a local, read-only view of an elevator fleet in step
//! with the authoritative controller and turns user intent into outbound
//! commands:
//!
//! - **[`Controller`]**: Facade owning the session lifecycle.
//!   [`connect()`](Controller::connect) spawns the STOMP link from
//!   `liftdeck-api` plus a single pump task that applies inbound fleet
//!   snapshots in arrival order; [`disconnect()`](Controller::disconnect)
//!   tears both down. Reconnection after failures is automatic.
//!
//! - **[`FleetStore`]** / **[`PendingRequests`]**: `watch`-backed state
//!   cells. Readers get whole `Arc` snapshots, never a torn mix of old
//!   and new units. [`StateStream<T>`] exposes `current()` / `latest()` /
//!   `changed()` for renderers.
//!
//! - **[`SnapshotIngestor`]**: Validates each inbound snapshot, diffs it
//!   index-by-index against the previous one to derive arrival and door
//!   events, clears serviced floor calls, then swaps the store.
//!
//! - **[`Dispatcher`]**: Guarded commands: floor calls and direct
//!   dispatch over STOMP, emergency/maintenance over HTTP. Every accepted
//!   command is reported as a [`FleetEvent`].
//!
//! - **[`alerts`]**: Maps [`FleetEvent`]s to [`AlertCue`]s and relays
//!   them to an [`AlertSink`] on its own task.

pub mod alerts;
pub mod command;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod ingest;
pub mod model;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use alerts::{AlertCue, AlertError, AlertSink, spawn_alert_forwarder};
pub use command::requests::{CallRequest, Direction, GotoRequest};
pub use command::CommandKind;
pub use config::{ControllerConfig, Destinations, FloorRange, TlsVerification};
pub use controller::{ConnectionState, Controller};
pub use dispatch::{Dispatcher, FleetEmergencyReport, UnitOutcome};
pub use error::CoreError;
pub use events::FleetEvent;
pub use ingest::{SnapshotIngestor, diff_units};
pub use model::{DoorState, FleetSnapshot, MovementState, Unit, UnitId, UnitMode};
pub use store::{FleetStore, PendingRequests};
pub use stream::{StateStream, StateWatchStream};
