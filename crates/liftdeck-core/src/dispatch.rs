// ── Command dispatch ──
//
// Guarded outbound commands. Hall and car calls go over the STOMP link,
// mode changes over the HTTP control endpoints. No command is retried and
// none is rolled back locally: the next snapshot is the only confirmation.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use futures_util::future::join_all;
use liftdeck_api::{ControlClient, Publisher};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::command::{CallRequest, CommandKind, Direction, GotoRequest};
use crate::config::{Destinations, FloorRange};
use crate::controller::ConnectionState;
use crate::error::CoreError;
use crate::events::FleetEvent;
use crate::model::UnitId;
use crate::store::{FleetStore, PendingRequests};

// ── Fleet emergency report ──────────────────────────────────────────

/// Outcome of one unit's emergency request.
#[derive(Debug)]
pub struct UnitOutcome {
    pub unit_id: UnitId,
    pub result: Result<(), CoreError>,
}

/// Per-unit results of [`Dispatcher::trigger_fleet_emergency`].
#[derive(Debug, Default)]
pub struct FleetEmergencyReport {
    pub outcomes: Vec<UnitOutcome>,
}

impl FleetEmergencyReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn any_succeeded(&self) -> bool {
        self.outcomes.iter().any(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

// ── Dispatcher ──────────────────────────────────────────────────────

/// Turns operator intent into outbound commands.
///
/// Every operation first checks that the link is usable and fails with
/// [`CoreError::NotConnected`] without any I/O otherwise. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    state: watch::Receiver<ConnectionState>,
    publisher: Arc<ArcSwapOption<Publisher>>,
    control: ControlClient,
    store: Arc<FleetStore>,
    pending: Arc<PendingRequests>,
    events: broadcast::Sender<FleetEvent>,
    destinations: Destinations,
    floors: FloorRange,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        state: watch::Receiver<ConnectionState>,
        publisher: Arc<ArcSwapOption<Publisher>>,
        control: ControlClient,
        store: Arc<FleetStore>,
        pending: Arc<PendingRequests>,
        events: broadcast::Sender<FleetEvent>,
        destinations: Destinations,
        floors: FloorRange,
    ) -> Self {
        Self {
            state,
            publisher,
            control,
            store,
            pending,
            events,
            destinations,
            floors,
        }
    }

    /// Whether commands would currently be attempted.
    pub fn is_usable(&self) -> bool {
        self.state.borrow().is_usable()
    }

    // ── Published commands ──────────────────────────────────────────

    /// Hall call. Lights `floor` in the pending set before publishing;
    /// the entry stays even if the publish fails.
    pub async fn call_elevator(&self, floor: i32, direction: Direction) -> Result<(), CoreError> {
        let publisher = self.ensure_connected()?;
        self.ensure_floor(floor)?;

        self.pending.add_request(floor);
        let command = CommandKind::Call { floor, direction };
        let body = encode(&CallRequest::new(floor, direction))?;
        self.publish(&publisher, &self.destinations.call, body, command)
            .await
    }

    /// Car call. Does not touch the pending set.
    pub async fn send_to_floor(&self, unit_id: UnitId, floor: i32) -> Result<(), CoreError> {
        let publisher = self.ensure_connected()?;
        self.ensure_floor(floor)?;

        let command = CommandKind::Goto { unit_id, floor };
        let body = encode(&GotoRequest::new(unit_id, floor))?;
        self.publish(&publisher, &self.destinations.goto, body, command)
            .await
    }

    // ── Control endpoint commands ───────────────────────────────────

    pub async fn trigger_emergency(&self, unit_id: UnitId) -> Result<(), CoreError> {
        self.ensure_connected()?;
        self.emergency(unit_id).await?;
        self.emit(FleetEvent::Alarm);
        Ok(())
    }

    pub async fn clear_emergency(&self, unit_id: UnitId) -> Result<(), CoreError> {
        self.ensure_connected()?;
        let command = CommandKind::ClearEmergency { unit_id };
        let result = self.control.clear_emergency(unit_id.get()).await;
        self.report(command, result)
    }

    pub async fn set_maintenance(&self, unit_id: UnitId, enabled: bool) -> Result<(), CoreError> {
        self.ensure_connected()?;
        let command = CommandKind::SetMaintenance { unit_id, enabled };
        let result = self.control.set_maintenance(unit_id.get(), enabled).await;
        self.report(command, result)
    }

    /// Trigger an emergency on every unit in the current snapshot.
    ///
    /// Requests run concurrently and independently; one `Alarm` is
    /// emitted if at least one unit accepted.
    pub async fn trigger_fleet_emergency(&self) -> Result<FleetEmergencyReport, CoreError> {
        self.ensure_connected()?;

        let unit_ids = self.store.unit_ids();
        let results = join_all(unit_ids.iter().map(|&id| self.emergency(id))).await;
        let report = FleetEmergencyReport {
            outcomes: unit_ids
                .into_iter()
                .zip(results)
                .map(|(unit_id, result)| UnitOutcome { unit_id, result })
                .collect(),
        };

        if report.any_succeeded() {
            self.emit(FleetEvent::Alarm);
        }
        info!(
            units = report.outcomes.len(),
            failed = report.failures().count(),
            "fleet emergency dispatched"
        );
        Ok(report)
    }

    // ── Internals ───────────────────────────────────────────────────

    fn ensure_connected(&self) -> Result<Arc<Publisher>, CoreError> {
        if !self.is_usable() {
            return Err(CoreError::NotConnected);
        }
        self.publisher.load_full().ok_or(CoreError::NotConnected)
    }

    fn ensure_floor(&self, floor: i32) -> Result<(), CoreError> {
        if self.floors.contains(floor) {
            Ok(())
        } else {
            Err(CoreError::FloorOutOfRange {
                floor,
                lowest: self.floors.lowest(),
                highest: self.floors.highest(),
            })
        }
    }

    async fn emergency(&self, unit_id: UnitId) -> Result<(), CoreError> {
        let command = CommandKind::TriggerEmergency { unit_id };
        let result = self.control.trigger_emergency(unit_id.get()).await;
        self.report(command, result)
    }

    async fn publish(
        &self,
        publisher: &Publisher,
        destination: &str,
        body: String,
        command: CommandKind,
    ) -> Result<(), CoreError> {
        let result = publisher.publish(destination, body).await;
        self.report(command, result)
    }

    /// Log and broadcast the outcome of `command`.
    fn report(
        &self,
        command: CommandKind,
        result: Result<(), liftdeck_api::Error>,
    ) -> Result<(), CoreError> {
        match result {
            Ok(()) => {
                info!(%command, "command sent");
                self.emit(FleetEvent::CommandSent { command });
                Ok(())
            }
            Err(e) => {
                warn!(%command, error = %e, "command failed");
                let err = CoreError::command_failed(command, &e);
                self.emit(FleetEvent::CommandFailed {
                    command,
                    reason: e.to_string(),
                });
                Err(err)
            }
        }
    }

    fn emit(&self, event: FleetEvent) {
        let _ = self.events.send(event);
    }
}

fn encode<T: Serialize>(body: &T) -> Result<String, CoreError> {
    serde_json::to_string(body).map_err(|e| CoreError::Internal(format!("encode command: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use liftdeck_api::{PublishRequest, TransportConfig};
    use serde_json::Value;
    use tokio::sync::mpsc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::model::{DoorState, FleetSnapshot, MovementState, Unit, UnitMode};

    struct Harness {
        dispatcher: Dispatcher,
        state: watch::Sender<ConnectionState>,
        pending: Arc<PendingRequests>,
        store: Arc<FleetStore>,
        events: broadcast::Receiver<FleetEvent>,
        outbound: mpsc::Receiver<PublishRequest>,
    }

    fn harness(control_base: &str) -> Harness {
        let (state, state_rx) = watch::channel(ConnectionState::Connected);
        let (publisher, outbound) = Publisher::channel(8);
        let store = Arc::new(FleetStore::new());
        let pending = Arc::new(PendingRequests::new());
        let (event_tx, events) = broadcast::channel(32);
        let control =
            ControlClient::new(control_base.parse().unwrap(), &TransportConfig::default()).unwrap();

        let dispatcher = Dispatcher::new(
            state_rx,
            Arc::new(ArcSwapOption::from_pointee(publisher)),
            control,
            store.clone(),
            pending.clone(),
            event_tx,
            Destinations::default(),
            FloorRange::default(),
        );
        Harness {
            dispatcher,
            state,
            pending,
            store,
            events,
            outbound,
        }
    }

    fn idle(id: u32) -> Unit {
        Unit {
            id: UnitId(id),
            current_floor: 0,
            movement_state: MovementState::Idle,
            door_state: DoorState::Closed,
            mode: UnitMode::Normal,
            capacity: 10,
        }
    }

    /// Answer every queued publish with `result` and hand back what was sent.
    fn respond(
        mut outbound: mpsc::Receiver<PublishRequest>,
        ok: bool,
    ) -> tokio::task::JoinHandle<Vec<(String, Value)>> {
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(req) = outbound.recv().await {
                seen.push((
                    req.destination.clone(),
                    serde_json::from_str(&req.body).unwrap(),
                ));
                let result = if ok {
                    Ok(())
                } else {
                    Err(liftdeck_api::Error::LinkDown)
                };
                req.resolve(result);
            }
            seen
        })
    }

    #[tokio::test]
    async fn not_connected_rejects_without_side_effects() {
        let mut h = harness("http://127.0.0.1:1");
        h.state.send_replace(ConnectionState::Errored);

        let err = h.dispatcher.call_elevator(5, Direction::Up).await.unwrap_err();
        assert!(matches!(err, CoreError::NotConnected));
        assert!(h.pending.is_empty());
        assert!(h.outbound.try_recv().is_err());
        assert!(h.events.try_recv().is_err());

        for state in [ConnectionState::Disconnected, ConnectionState::Connecting] {
            h.state.send_replace(state);
            assert!(matches!(
                h.dispatcher.send_to_floor(UnitId(1), 3).await,
                Err(CoreError::NotConnected)
            ));
            assert!(matches!(
                h.dispatcher.trigger_emergency(UnitId(1)).await,
                Err(CoreError::NotConnected)
            ));
            assert!(matches!(
                h.dispatcher.trigger_fleet_emergency().await,
                Err(CoreError::NotConnected)
            ));
        }
    }

    #[tokio::test]
    async fn missing_publisher_counts_as_not_connected() {
        let h = harness("http://127.0.0.1:1");
        h.dispatcher.publisher.store(None);
        assert!(matches!(
            h.dispatcher.call_elevator(2, Direction::Down).await,
            Err(CoreError::NotConnected)
        ));
        assert!(h.pending.is_empty());
    }

    #[tokio::test]
    async fn call_marks_pending_and_publishes() {
        let mut h = harness("http://127.0.0.1:1");
        let responder = respond(std::mem::replace(&mut h.outbound, mpsc::channel(1).1), true);

        h.dispatcher.call_elevator(5, Direction::Up).await.unwrap();
        assert!(h.pending.contains(5));

        assert_eq!(
            h.events.recv().await.unwrap(),
            FleetEvent::CommandSent {
                command: CommandKind::Call {
                    floor: 5,
                    direction: Direction::Up
                }
            }
        );

        drop(h.dispatcher);
        let sent = responder.await.unwrap();
        assert_eq!(sent.len(), 1);
        let (dest, body) = &sent[0];
        assert_eq!(dest, "/app/elevator/call");
        assert_eq!(body["targetFloor"], 5);
        assert_eq!(body["direction"], "UP");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn failed_call_keeps_optimistic_pending_entry() {
        let mut h = harness("http://127.0.0.1:1");
        let _responder = respond(std::mem::replace(&mut h.outbound, mpsc::channel(1).1), false);

        let err = h.dispatcher.call_elevator(4, Direction::Down).await.unwrap_err();
        assert!(matches!(err, CoreError::CommandFailed { .. }));
        assert!(h.pending.contains(4));
        assert_eq!(h.events.recv().await.unwrap().name(), "command-failed");
    }

    #[tokio::test]
    async fn goto_publishes_without_pending() {
        let mut h = harness("http://127.0.0.1:1");
        let responder = respond(std::mem::replace(&mut h.outbound, mpsc::channel(1).1), true);

        h.dispatcher.send_to_floor(UnitId(2), 8).await.unwrap();
        assert!(h.pending.is_empty());

        drop(h.dispatcher);
        let sent = responder.await.unwrap();
        let (dest, body) = &sent[0];
        assert_eq!(dest, "/app/elevator/goto");
        assert_eq!(body["elevatorId"], 2);
        assert_eq!(body["targetFloor"], 8);
    }

    #[tokio::test]
    async fn top_floor_is_a_valid_target() {
        let mut h = harness("http://127.0.0.1:1");
        let responder = respond(std::mem::replace(&mut h.outbound, mpsc::channel(1).1), true);

        h.dispatcher.call_elevator(10, Direction::Down).await.unwrap();
        h.dispatcher.send_to_floor(UnitId(1), 10).await.unwrap();
        assert!(h.pending.contains(10));

        drop(h.dispatcher);
        let sent = responder.await.unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1["targetFloor"], 10);
        assert_eq!(sent[1].1["targetFloor"], 10);
    }

    #[tokio::test]
    async fn out_of_range_floor_is_rejected_before_io() {
        let mut h = harness("http://127.0.0.1:1");
        assert!(matches!(
            h.dispatcher.call_elevator(11, Direction::Up).await,
            Err(CoreError::FloorOutOfRange { floor: 11, .. })
        ));
        assert!(matches!(
            h.dispatcher.send_to_floor(UnitId(1), -1).await,
            Err(CoreError::FloorOutOfRange { floor: -1, .. })
        ));
        assert!(h.pending.is_empty());
        assert!(h.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn trigger_emergency_emits_sent_then_alarm() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/elevator/emergency"))
            .and(query_param("elevatorId", "3"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut h = harness(&server.uri());
        h.dispatcher.trigger_emergency(UnitId(3)).await.unwrap();

        assert_eq!(h.events.recv().await.unwrap().name(), "command-sent");
        assert_eq!(h.events.recv().await.unwrap(), FleetEvent::Alarm);
    }

    #[tokio::test]
    async fn rejected_control_call_is_command_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/elevator/maintenance"))
            .and(query_param("enable", "true"))
            .respond_with(ResponseTemplate::new(409).set_body_string("in emergency"))
            .mount(&server)
            .await;

        let mut h = harness(&server.uri());
        let err = h
            .dispatcher
            .set_maintenance(UnitId(1), true)
            .await
            .unwrap_err();
        match err {
            CoreError::CommandFailed { command, reason } => {
                assert_eq!(
                    command,
                    CommandKind::SetMaintenance {
                        unit_id: UnitId(1),
                        enabled: true
                    }
                );
                assert!(reason.contains("in emergency"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.events.recv().await.unwrap().name(), "command-failed");
    }

    #[tokio::test]
    async fn clear_emergency_hits_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/elevator/clearEmergency"))
            .and(query_param("elevatorId", "7"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server.uri());
        h.dispatcher.clear_emergency(UnitId(7)).await.unwrap();
    }

    #[tokio::test]
    async fn fleet_emergency_reports_each_unit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/elevator/emergency"))
            .and(query_param("elevatorId", "2"))
            .respond_with(ResponseTemplate::new(500))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/elevator/emergency"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut h = harness(&server.uri());
        h.store
            .replace(FleetSnapshot::from_units(vec![idle(1), idle(2), idle(3)]));

        let report = h.dispatcher.trigger_fleet_emergency().await.unwrap();
        assert_eq!(report.outcomes.len(), 3);
        assert!(!report.all_succeeded());
        let failed: Vec<UnitId> = report.failures().map(|o| o.unit_id).collect();
        assert_eq!(failed, vec![UnitId(2)]);

        let mut names = Vec::new();
        while let Ok(event) = h.events.try_recv() {
            names.push(event.name());
        }
        assert_eq!(names.iter().filter(|n| **n == "alarm").count(), 1);
        assert_eq!(names.iter().filter(|n| **n == "command-sent").count(), 2);
        assert_eq!(names.iter().filter(|n| **n == "command-failed").count(), 1);
    }

    #[tokio::test]
    async fn fleet_emergency_with_no_units_is_empty() {
        let mut h = harness("http://127.0.0.1:1");
        let report = h.dispatcher.trigger_fleet_emergency().await.unwrap();
        assert!(report.outcomes.is_empty());
        assert!(report.all_succeeded());
        assert!(h.events.try_recv().is_err());
    }
}
